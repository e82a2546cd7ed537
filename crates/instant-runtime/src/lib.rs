pub mod api;
pub mod config;
pub mod grouping;
pub mod notices;
pub mod pagination;
pub mod progress;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod view;
pub mod window;

pub use api::{HttpResultsApi, ResultsApi};
pub use config::{Mechanism, SessionConfig, TransportConfig};
pub use grouping::{GroupingChange, GroupingController, ResultMode};
pub use notices::{Notice, NoticeBoard, Severity};
pub use pagination::{
    History, HistoryEntry, MemoryHistory, NavigationState, PageControl, PaginationControls,
    PaginationSync, PopState,
};
pub use progress::ProgressBar;
pub use protocol::{
    ErrorKind, Package, PackagePage, Pagination, ProgressUpdate, ProtocolError, ResultRow,
    StreamMessage,
};
pub use session::{QuerySession, SessionError, SessionEvent, SessionState};
pub use transport::{
    DefaultTransportFactory, ReconnectPolicy, Transport, TransportEvent, TransportFactory,
    TransportKind, TransportSink,
};
pub use view::{PackageResults, PackageSummary, View};
pub use window::ResultWindow;

/// Initialize structured JSON logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}
