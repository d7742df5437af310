//! Items used by the code `wf_serial_derive` generates. Not public API.

#[cfg(feature = "auto_register")]
pub mod auto_register {
    use crate::model::TypedModel;
    use crate::registry::ModelRegistry;

    pub use inventory;

    /// One `#[model(auto_register)]` submission.
    pub struct __AutoRegisterFunc(pub fn(&mut ModelRegistry));

    inventory::collect!(__AutoRegisterFunc);

    #[inline]
    pub fn __register<T: TypedModel>(registry: &mut ModelRegistry) {
        registry.register::<T>();
    }

    /// Runs every submission against `registry`.
    pub fn register_submitted(registry: &mut ModelRegistry) -> usize {
        let mut count = 0;
        for func in inventory::iter::<__AutoRegisterFunc> {
            (func.0)(registry);
            count += 1;
        }
        log::debug!("auto-registered {count} model types");
        count
    }
}
