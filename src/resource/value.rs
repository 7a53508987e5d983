//! Values that may be literals or functions of a context

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A literal or a synchronous function of `P`
pub enum Valuable<R, P = ()> {
    Value(R),
    Fn(Arc<dyn Fn(&P) -> R + Send + Sync>),
}

impl<R: Clone, P> Valuable<R, P> {
    pub fn from_fn(f: impl Fn(&P) -> R + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(f))
    }

    /// Call the function with `params`, or clone the literal
    pub fn resolve(&self, params: &P) -> R {
        match self {
            Self::Value(value) => value.clone(),
            Self::Fn(f) => f(params),
        }
    }

    pub fn is_fn(&self) -> bool {
        matches!(self, Self::Fn(_))
    }
}

impl<R: Clone> Valuable<R, ()> {
    /// Resolve a valuable that takes no parameters
    pub fn get(&self) -> R {
        self.resolve(&())
    }
}

impl<R: Clone, P> Clone for Valuable<R, P> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Fn(f) => Self::Fn(Arc::clone(f)),
        }
    }
}

impl<R: fmt::Debug, P> fmt::Debug for Valuable<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

impl<P> From<&str> for Valuable<String, P> {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl<P> From<String> for Valuable<String, P> {
    fn from(value: String) -> Self {
        Self::Value(value)
    }
}

/// A literal, a synchronous function, or an asynchronous function of `P`
pub enum AsyncValuable<R, P = ()> {
    Value(R),
    Fn(Arc<dyn Fn(&P) -> R + Send + Sync>),
    Future(Arc<dyn Fn(&P) -> BoxFuture<'static, R> + Send + Sync>),
}

impl<R: Clone + Send + 'static, P> AsyncValuable<R, P> {
    pub fn from_fn(f: impl Fn(&P) -> R + Send + Sync + 'static) -> Self {
        Self::Fn(Arc::new(f))
    }

    /// Wrap an async factory. The closure receives the params by reference
    /// and must hand back an owned future.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(&P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        P: 'static,
    {
        Self::Future(Arc::new(move |params: &P| f(params).boxed()))
    }

    /// Resolve, awaiting only when the function is asynchronous
    pub async fn resolve(&self, params: &P) -> R {
        match self {
            Self::Value(value) => value.clone(),
            Self::Fn(f) => f(params),
            Self::Future(f) => f(params).await,
        }
    }
}

impl<R: Clone + Send + 'static> AsyncValuable<R, ()> {
    pub async fn get(&self) -> R {
        self.resolve(&()).await
    }
}

impl<R: Clone, P> Clone for AsyncValuable<R, P> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Fn(f) => Self::Fn(Arc::clone(f)),
            Self::Future(f) => Self::Future(Arc::clone(f)),
        }
    }
}

impl<R: fmt::Debug, P> fmt::Debug for AsyncValuable<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
            Self::Future(_) => f.write_str("Future(..)"),
        }
    }
}

impl<R, P> From<Valuable<R, P>> for AsyncValuable<R, P> {
    fn from(valuable: Valuable<R, P>) -> Self {
        match valuable {
            Valuable::Value(value) => Self::Value(value),
            Valuable::Fn(f) => Self::Fn(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_literal_is_returned_unchanged() {
        let url: Valuable<String, u32> = "/users".into();
        assert_eq!(url.resolve(&7), "/users");
        assert!(!url.is_fn());
    }

    #[test]
    fn test_function_receives_params() {
        let url = Valuable::from_fn(|id: &u32| format!("/users/{}", id));
        assert_eq!(url.resolve(&7), "/users/7");
    }

    #[test]
    fn test_function_without_params() {
        let size = Valuable::from_fn(|_: &()| 20_u32);
        assert_eq!(size.get(), 20);
    }

    #[tokio::test]
    async fn test_async_resolves_each_variant() {
        let literal: AsyncValuable<u32, u32> = AsyncValuable::Value(1);
        let sync = AsyncValuable::from_fn(|p: &u32| p + 1);
        let future = AsyncValuable::from_async(|p: &u32| {
            let p = *p;
            async move { p * 10 }
        });

        assert_eq!(literal.resolve(&5).await, 1);
        assert_eq!(sync.resolve(&5).await, 6);
        assert_eq!(future.resolve(&5).await, 50);
    }

    #[tokio::test]
    async fn test_sync_function_called_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let valuable: AsyncValuable<u32> = AsyncValuable::from_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            3
        });

        assert_eq!(valuable.get().await, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_valuable_converts_into_async() {
        let valuable: AsyncValuable<String, ()> = Valuable::from("x").into();
        assert!(matches!(valuable, AsyncValuable::Value(ref s) if s == "x"));
    }
}
