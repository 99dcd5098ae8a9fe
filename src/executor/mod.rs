pub mod adb;
pub mod apps;
pub mod coordinator;
pub mod dispatcher;
pub mod input;
pub mod safety;
pub mod text_input;
pub mod traits;

pub use dispatcher::AdbController;
pub use traits::{ActionOutcome, DeviceController, Interaction};
