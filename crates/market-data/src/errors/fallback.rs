/// Classification used by the orchestrator when a provider call fails.
///
/// | Class | Try Next Provider? | Log level |
/// |-------|-------------------|-----------|
/// | `NextProvider` | Yes | warn |
/// | `Absorbed` | Yes | debug |
///
/// No provider failure is terminal on its own: the fetch only fails once
/// every enabled provider has been tried.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FallbackClass {
    /// The provider could not serve this request; another one might.
    NextProvider,

    /// The provider throttled us despite local admission control.
    /// The local rate limiter is expected to make this rare, so it is not
    /// worth more than a debug line.
    Absorbed,
}
