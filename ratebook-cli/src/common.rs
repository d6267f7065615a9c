use anyhow::Context;
use async_trait::async_trait;
use erased_serde::Serializer;
use serde::Serialize;

/// A command, or a level of the command tree, that can be run.
/// Structured results go to `serializer`; anything for humans goes straight to stdout.
#[async_trait]
pub trait Run {
    async fn run(&self, serializer: &mut (dyn Serializer + Send)) -> anyhow::Result<()>;
}

/// Write one result through the output serializer.
pub fn emit<T: Serialize>(value: &T, serializer: &mut (dyn Serializer + Send)) -> anyhow::Result<()> {
    erased_serde::serialize(value, serializer).context("could not write result")?;
    Ok(())
}

/// Implement [`Run`] for a type with a block, which sees `self` and the serializer under the given names.
#[macro_export]
macro_rules! run_impl {
    ($i:ident, $self:ident, $ser:ident, $b:block) => {
        #[async_trait::async_trait]
        impl $crate::common::Run for $i {
            async fn run(&$self, $ser: &mut (dyn erased_serde::Serializer + Send)) -> anyhow::Result<()> {
                $b;

                Ok(())
            }
        }
    }
}
