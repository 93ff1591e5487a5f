//! Chain resolution: try candidates in priority order, first match wins

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{ActionPrimitives, WaitRequest};
use async_trait::async_trait;
use dom_tree::Element;
use tracing::{debug, info, warn};

use crate::errors::LocatorError;
use crate::types::{LocatorChain, LocatorStrategy, ResolutionResult};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve against the current tree without waiting.
    fn resolve_now(
        &self,
        chain: &LocatorChain,
        scope: &Element,
    ) -> Result<Option<ResolutionResult>, LocatorError>;

    /// Wait until some candidate matches.
    async fn resolve(
        &self,
        chain: &LocatorChain,
        timeout: Duration,
    ) -> Result<ResolutionResult, LocatorError>;
}

/// Resolver that waits through the action primitives' observer.
pub struct ChainResolver<P: ?Sized> {
    primitives: Arc<P>,
}

impl<P: ActionPrimitives + ?Sized> ChainResolver<P> {
    pub fn new(primitives: Arc<P>) -> Self {
        Self { primitives }
    }
}

#[async_trait]
impl<P: ActionPrimitives + ?Sized + 'static> ElementResolver for ChainResolver<P> {
    fn resolve_now(
        &self,
        chain: &LocatorChain,
        scope: &Element,
    ) -> Result<Option<ResolutionResult>, LocatorError> {
        if chain.is_empty() {
            return Err(LocatorError::EmptyChain(chain.name.clone()));
        }
        for (index, candidate) in chain.candidates.iter().enumerate() {
            debug!(chain = %chain.name, index, candidate = %candidate, "trying candidate");
            match candidate.evaluate(scope) {
                Ok(Some(element)) => {
                    return Ok(Some(ResolutionResult {
                        element,
                        candidate_index: index,
                        strategy: LocatorStrategy::of(candidate),
                    }))
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(chain = %chain.name, index, "candidate failed: {}", err);
                    return Err(LocatorError::InvalidLocator {
                        chain: chain.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(None)
    }

    async fn resolve(
        &self,
        chain: &LocatorChain,
        timeout: Duration,
    ) -> Result<ResolutionResult, LocatorError> {
        if chain.is_empty() {
            return Err(LocatorError::EmptyChain(chain.name.clone()));
        }
        let element = self
            .primitives
            .wait_for(WaitRequest::new(chain.to_condition()).timeout(timeout))
            .await?;
        let scope = element
            .document()
            .map(|doc| doc.root())
            .unwrap_or_else(|| element.clone());
        // Credit the candidate that matches now; the chain as a whole otherwise.
        let (candidate_index, strategy) = match self.resolve_now(chain, &scope)? {
            Some(hit) if hit.element == element => (hit.candidate_index, hit.strategy),
            _ => (0, LocatorStrategy::Chain),
        };
        info!(
            chain = %chain.name,
            candidate_index,
            strategy = strategy.name(),
            "resolved {}",
            element
        );
        Ok(ResolutionResult {
            element,
            candidate_index,
            strategy,
        })
    }
}
