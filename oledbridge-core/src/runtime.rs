//! Bus attachment control
//!
//! Enables and disables the emulated target without a restart. Requests
//! are deferred: [`RuntimeController::set_enabled`] only records the wish,
//! the polling tick applies it through [`RuntimeController::service`], so a
//! transfer in flight is never cut short. The display model is not touched.

use oledbridge_hal::i2c::{I2cTarget, I2cTargetConfig};

/// Drives an [`I2cTarget`] towards the requested enable state
#[derive(Debug)]
pub struct RuntimeController<T> {
    target: T,
    /// Parameters from the first `begin`, reused on every re-attach
    params: Option<I2cTargetConfig>,
    enabled: bool,
    attached: bool,
    pending: bool,
    attach_failures: u32,
}

impl<T: I2cTarget> RuntimeController<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            params: None,
            enabled: false,
            attached: false,
            pending: false,
            attach_failures: 0,
        }
    }

    /// Remember the bus parameters and attach if `enabled`
    ///
    /// Returns `false` if the parameters are invalid or the bus could not be
    /// acquired. A failed attach is retried from [`Self::service`].
    pub fn begin(&mut self, params: I2cTargetConfig, enabled: bool) -> bool {
        if let Err(_e) = params.validate() {
            error!("runtime: invalid target config {}", _e);
            return false;
        }
        self.params = Some(params);
        self.enabled = enabled;
        self.pending = true;
        self.service()
    }

    /// Request the bus be attached or released on the next tick
    ///
    /// Repeating the current state is a no-op.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            trace!("runtime: enable state unchanged");
            return;
        }
        debug!("runtime: enable -> {}", enabled);
        self.enabled = enabled;
        self.pending = true;
    }

    /// Apply a pending enable/disable request
    ///
    /// Returns whether the bus attachment matches the requested state.
    pub fn service(&mut self) -> bool {
        if !self.pending {
            return self.attached == self.enabled;
        }

        if self.enabled {
            let Some(params) = self.params else {
                // Nothing to attach with until `begin`
                return false;
            };
            match self.target.attach(&params) {
                Ok(()) => {
                    info!(
                        "runtime: attached at {=u8:#x} (sda {=u8}, scl {=u8})",
                        params.address,
                        params.sda_pin,
                        params.scl_pin
                    );
                    self.attached = true;
                    self.pending = false;
                    self.attach_failures = 0;
                }
                Err(_) => {
                    if self.attach_failures == 0 {
                        error!("runtime: failed to acquire bus at {=u8:#x}", params.address);
                    }
                    self.attach_failures = self.attach_failures.saturating_add(1);
                    self.attached = false;
                }
            }
        } else {
            if self.attached {
                self.target.detach();
                info!("runtime: bus released");
            }
            self.attached = false;
            self.pending = false;
            self.attach_failures = 0;
        }

        self.attached == self.enabled
    }

    /// Requested state
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Attachment as last applied
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// A request is waiting for the next tick
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consecutive failed attach attempts
    pub fn attach_failures(&self) -> u32 {
        self.attach_failures
    }

    pub fn params(&self) -> Option<&I2cTargetConfig> {
        self.params.as_ref()
    }

    pub fn target(&self) -> &T {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeTarget {
        attached: bool,
        fail_attaches: u32,
        attaches: u32,
        detaches: u32,
        last_config: Option<I2cTargetConfig>,
    }

    impl I2cTarget for FakeTarget {
        type Error = ();

        fn attach(&mut self, config: &I2cTargetConfig) -> Result<(), ()> {
            if self.fail_attaches > 0 {
                self.fail_attaches -= 1;
                return Err(());
            }
            self.attaches += 1;
            self.attached = true;
            self.last_config = Some(*config);
            Ok(())
        }

        fn detach(&mut self) {
            self.detaches += 1;
            self.attached = false;
        }

        fn is_attached(&self) -> bool {
            self.attached
        }
    }

    fn params() -> I2cTargetConfig {
        I2cTargetConfig {
            sda_pin: 8,
            scl_pin: 9,
            address: 0x3C,
            frequency: 100_000,
        }
    }

    #[test]
    fn test_begin_attaches() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        assert!(rt.begin(params(), true));
        assert!(rt.is_attached());
        assert_eq!(rt.target().attaches, 1);
        assert_eq!(rt.target().last_config, Some(params()));
    }

    #[test]
    fn test_begin_disabled_stays_off_bus() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        assert!(rt.begin(params(), false));
        assert!(!rt.is_attached());
        assert_eq!(rt.target().attaches, 0);
    }

    #[test]
    fn test_begin_rejects_reserved_address() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        let bad = I2cTargetConfig {
            address: 0x7A,
            ..params()
        };
        assert!(!rt.begin(bad, true));
        assert!(rt.params().is_none());
        assert_eq!(rt.target().attaches, 0);
    }

    #[test]
    fn test_disable_is_deferred_to_service() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        rt.begin(params(), true);

        rt.set_enabled(false);
        assert!(rt.is_attached());
        assert!(rt.is_pending());

        assert!(rt.service());
        assert!(!rt.is_attached());
        assert_eq!(rt.target().detaches, 1);
    }

    #[test]
    fn test_reenable_uses_original_params() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        rt.begin(params(), true);
        rt.set_enabled(false);
        rt.service();
        rt.set_enabled(true);
        assert!(rt.service());
        assert_eq!(rt.target().attaches, 2);
        assert_eq!(rt.target().last_config, Some(params()));
    }

    #[test]
    fn test_set_enabled_idempotent() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        rt.begin(params(), true);
        rt.set_enabled(true);
        assert!(!rt.is_pending());
        rt.service();
        assert_eq!(rt.target().attaches, 1);

        rt.set_enabled(false);
        rt.set_enabled(false);
        rt.service();
        rt.service();
        assert_eq!(rt.target().detaches, 1);
    }

    #[test]
    fn test_attach_failure_reported_and_retried() {
        let target = FakeTarget {
            fail_attaches: 2,
            ..FakeTarget::default()
        };
        let mut rt = RuntimeController::new(target);
        assert!(!rt.begin(params(), true));
        assert!(!rt.service());
        assert_eq!(rt.attach_failures(), 2);

        assert!(rt.service());
        assert!(rt.is_attached());
        assert_eq!(rt.attach_failures(), 0);
    }

    #[test]
    fn test_enable_without_begin_fails() {
        let mut rt = RuntimeController::new(FakeTarget::default());
        rt.set_enabled(true);
        assert!(!rt.service());
        assert_eq!(rt.target().attaches, 0);
    }
}
