pub mod backend;
pub mod controller;
pub mod observer;

pub use backend::{AdLoader, AdPresenter, AdRequest, HostContext};
pub use controller::{AdSessionController, PresentationHandle};
pub use observer::{AdSessionObserver, ChannelObserver, SessionEvent};
