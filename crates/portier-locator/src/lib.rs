pub mod consul;
pub mod instance;
pub mod picker;
pub mod static_locator;
pub mod traits;

pub use consul::ConsulLocator;
pub use instance::generate_instance_id;
pub use picker::{EndpointPicker, FirstPicker, RandomPicker};
pub use static_locator::StaticLocator;
pub use traits::{split_host_port, LocatorError, Result, ServiceLocator};
