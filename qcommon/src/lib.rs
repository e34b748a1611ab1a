//! Shared primitives for the quill workspace crates.
//!
//! ```rust
//! use qcommon::{CancelSignal, SamplingOptions, UserId};
//!
//! let user = UserId::from("user-7");
//! let cancel = CancelSignal::new();
//! let sampling = SamplingOptions::default().with_temperature(0.8).with_top_p(0.9);
//!
//! assert_eq!(user.as_str(), "user-7");
//! assert!(!cancel.is_cancelled());
//! assert_eq!(sampling.temperature, Some(0.8));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use qcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Cross-crate identifier newtypes.

    use std::fmt::{Display, Formatter};

    /// Identifies the end user a generation request is running for. Pools
    /// and verified-model caches are scoped by this value.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct UserId(String);

    impl UserId {
        pub fn new(value: impl Into<String>) -> Self {
            Self(value.into())
        }

        pub fn as_str(&self) -> &str {
            self.0.as_str()
        }
    }

    impl Display for UserId {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl From<String> for UserId {
        fn from(value: String) -> Self {
            Self(value)
        }
    }

    impl From<&str> for UserId {
        fn from(value: &str) -> Self {
            Self(value.to_string())
        }
    }
}

pub mod sampling {
    //! Generation sampling settings shared by request types.
    //!
    //! ```rust
    //! use qcommon::SamplingOptions;
    //!
    //! let options = SamplingOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_top_p(0.95)
    //!     .with_max_output_tokens(2048);
    //!
    //! assert_eq!(options.top_p, Some(0.95));
    //! assert_eq!(options.max_output_tokens, Some(2048));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct SamplingOptions {
        pub temperature: Option<f32>,
        pub top_p: Option<f32>,
        pub max_output_tokens: Option<u32>,
    }

    impl SamplingOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_top_p(mut self, top_p: f32) -> Self {
            self.top_p = Some(top_p);
            self
        }

        pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
            self.max_output_tokens = Some(max_output_tokens);
            self
        }
    }
}

pub mod cancel {
    //! Cooperative cancellation shared between a request's issuer and the
    //! task consuming the backend stream.
    //!
    //! Cancellation is checked at suspension points only; an in-flight
    //! network call is not interrupted, but no further results are consumed
    //! once the signal is observed.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Clone, Default)]
    pub struct CancelSignal {
        cancelled: Arc<AtomicBool>,
    }

    impl CancelSignal {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub use cancel::CancelSignal;
pub use context::UserId;
pub use future::BoxFuture;
pub use registry::Registry;
pub use sampling::SamplingOptions;
