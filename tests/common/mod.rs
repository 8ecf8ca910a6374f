#![allow(unused_imports)]

pub use dagrun_test_utils::builders;
pub use dagrun_test_utils::fake_executor;
pub use dagrun_test_utils::{init_tracing, with_timeout};
