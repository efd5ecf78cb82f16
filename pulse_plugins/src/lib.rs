pub mod classifier;
pub mod fetch;
pub mod http;
pub mod status;
pub mod system;

pub use classifier::{ServiceClassifier, ServiceMatcher};
pub use fetch::{
    CallInterceptor, Fetch, FetchError, FetchRequest, FetchResponse, FetchSlot, ReqwestFetch,
    RestoreHandle, ServiceStats, GLOBAL_FETCH,
};
pub use http::{HttpRequestMetrics, HttpResponseMetrics, ResponseTimer};
pub use status::StatusClass;
pub use system::SystemSampler;
