// ── Reactive state store ──

mod collection;
mod data_store;
pub(crate) mod refresh;

pub use collection::Registry;
pub use data_store::DeviceStore;
