pub mod services;

pub use services::{store_temp, upload, TempFile};
