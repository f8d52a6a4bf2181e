use crate::Interceptor;
use crate::noop::NoopInterceptor;

/// Builds an interceptor chain from the inside out.
///
/// Each call to [`with`](Registry::with) wraps the chain built so far, so the
/// last interceptor added is the first one to see packets.
///
/// ```ignore
/// fn register_reports<P: Interceptor>(registry: Registry<P>) -> Registry<impl Interceptor> {
///     registry
///         .with(ReceiverReportBuilder::new().build())
///         .with(SenderReportBuilder::new().build())
/// }
///
/// let chain = register_reports(Registry::new()).build();
/// ```
pub struct Registry<P> {
    inner: P,
}

impl Registry<NoopInterceptor> {
    /// Starts an empty chain terminated by a [`NoopInterceptor`].
    pub fn new() -> Self {
        Registry {
            inner: NoopInterceptor::new(),
        }
    }
}

impl Default for Registry<NoopInterceptor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Interceptor> Registry<P> {
    /// Starts a chain from an existing interceptor.
    pub fn from(inner: P) -> Self {
        Registry { inner }
    }

    /// Wraps the chain with the interceptor produced by `f`.
    pub fn with<O, F>(self, f: F) -> Registry<O>
    where
        F: FnOnce(P) -> O,
        O: Interceptor,
    {
        Registry {
            inner: f(self.inner),
        }
    }

    pub fn build(self) -> P {
        self.inner
    }
}
