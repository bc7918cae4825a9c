pub mod bus;
pub mod dispatch;

pub use bus::{
    AI_RESPONSE_READY, CONFIG_CHANGED, Callback, Event, EventBus, SERVICE_REGISTERED,
    SubscriptionId, VFS_WRITE,
};
pub use dispatch::{DispatchError, Dispatcher};
