mod annotate;
mod batch;
mod highlight;

pub use annotate::*;
pub use batch::*;
pub use highlight::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
