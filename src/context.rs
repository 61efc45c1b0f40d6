//! The input context: registry, poll strategies and menu state in one owned value.
//!
//! Everything the menu and gameplay-sampling code needs goes through
//! [`InputContext`]. It is single-threaded by construction: every wait happens on
//! the calling thread and no call runs concurrently with another.

use crate::binds::{ActionMasks, BindTable, BindType};
use crate::config::{InputConfig, NoDevicePolicy};
use crate::driver::{ConfigOption, Driver, DriverId, DriverTable, KeyNames, ProbedDevice};
use crate::error::{InputError, Result};
use crate::menu::{suppress_diagonals, MenuButtons, MenuState};
use crate::poll::{BlockingPoll, DeviceEvent, HandleWaiter, PollStrategy, SpinPoll};
use crate::registry::{DeviceId, Registry};
use log::{debug, error};
use std::borrow::Cow;
use std::time::Duration;

pub struct InputContext {
    config: InputConfig,
    registry: Registry,
    menu: MenuState,
    blocking: BlockingPoll,
    spin: SpinPoll,
}

impl InputContext {
    /// Context with no drivers installed; see [`InputContext::install_driver`].
    pub fn new(config: InputConfig) -> Self {
        Self::with_drivers(config, DriverTable::new())
    }

    pub fn with_drivers(config: InputConfig, drivers: DriverTable) -> Self {
        let registry = Registry::new(drivers, &config);
        let spin = SpinPoll::new(config.async_poll_interval());
        Self {
            config,
            registry,
            menu: MenuState::default(),
            blocking: BlockingPoll::default(),
            spin,
        }
    }

    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn menu_state(&self) -> &MenuState {
        &self.menu
    }

    pub fn install_driver(&mut self, id: DriverId, driver: Box<dyn Driver>) {
        self.registry.drivers_mut().install(id, driver);
    }

    /// Replace the multiplexed wait used while no async-only device is present.
    pub fn set_waiter(&mut self, waiter: Box<dyn HandleWaiter>) {
        self.blocking.set_waiter(waiter);
    }

    pub fn register(&mut self, driver: DriverId, device: ProbedDevice) -> Option<DeviceId> {
        self.registry.register(driver, device)
    }

    /// Re-scan all drivers. Menu state starts over.
    pub fn probe(&mut self) {
        self.menu.reset();
        self.registry.probe();
    }

    fn no_devices<T>(&self) -> Result<T> {
        match self.config.no_device_policy {
            NoDevicePolicy::Exit => {
                error!("input: failed to find devices to read");
                std::process::exit(1);
            }
            NoDevicePolicy::Error => Err(InputError::NoDevices),
        }
    }

    /// Wait up to `timeout` (`None`: forever) for a raw key transition.
    ///
    /// Returns `Ok(None)` on timeout. The event is also folded into the held menu
    /// buttons, so raw and menu polling can be mixed.
    pub fn update_keycode(&mut self, timeout: Option<Duration>) -> Result<Option<DeviceEvent>> {
        let strategy: &mut dyn PollStrategy = if self.registry.have_async_devices() {
            &mut self.spin
        } else {
            &mut self.blocking
        };

        let event = match strategy.next_event(&mut self.registry, timeout) {
            Err(InputError::NoDevices) => return self.no_devices(),
            other => other?,
        };

        if let Some(ev) = event {
            let button = self.registry.menu_button(ev.device, ev.code);
            if !button.is_empty() {
                self.menu.apply(button, ev.down);
                debug!(
                    "input: #{} code {} -> {:?} held {:?}",
                    ev.device,
                    ev.code,
                    button,
                    self.menu.held()
                );
            }
        }
        Ok(event)
    }

    /// Wait until the held menu buttons change or `timeout` passes, and return
    /// them. The device that changed them becomes the last used device.
    pub fn menu_wait_any(&mut self, timeout: Option<Duration>) -> Result<MenuButtons> {
        let before = self.menu.held();
        while let Some(ev) = self.update_keycode(timeout)? {
            if self.menu.held() != before {
                self.menu.set_last_used_dev(ev.device);
                break;
            }
        }
        Ok(self.menu.held())
    }

    /// Menu navigation wait with autorepeat.
    ///
    /// Only returns once the held buttons intersect `interesting`. The first
    /// wait allows the configured initial delay; while the result keeps
    /// repeating, waits shrink to `autorep_delay`. Diagonals come back with the
    /// horizontal direction removed.
    pub fn menu_wait(&mut self, interesting: MenuButtons, autorep_delay: Duration) -> Result<MenuButtons> {
        let wait = self
            .menu
            .autorepeat_mut()
            .wait_time(self.config.menu_initial_delay(), autorep_delay);

        let mut result = self.menu_wait_any(Some(wait))?;
        self.menu.autorepeat_mut().observe(result);

        let mut released = false;
        while !result.intersects(interesting) {
            result = self.menu_wait_any(None)?;
            released = true;
        }

        self.menu.autorepeat_mut().settle(result, released);
        Ok(suppress_diagonals(result))
    }

    /// Gameplay sampling: action masks of everything held right now.
    pub fn update(&mut self) -> ActionMasks {
        self.registry.update()
    }

    /// Switch devices between blocking and non-blocking reads, then drop any
    /// pending events.
    pub fn set_blocking(&mut self, blocking: bool) {
        // async-only devices force spin polling, so reads stay non-blocking
        if !self.registry.have_async_devices() {
            self.registry.set_blocking(blocking);
        }

        self.menu.clear_held();

        if self.registry.probed_ids().is_empty() {
            return;
        }
        loop {
            match self.update_keycode(Some(Duration::ZERO)) {
                Ok(Some(_)) => continue,
                Ok(None) => break,
                Err(err) => {
                    debug!("input: flush stopped: {err}");
                    break;
                }
            }
        }
    }

    pub fn get_config(&self, id: DeviceId, option: ConfigOption) -> Result<i32> {
        self.registry.get_config(id, option)
    }

    /// Per-device option; [`ConfigOption::Blocking`] applies to every device
    /// through [`InputContext::set_blocking`].
    pub fn set_config(&mut self, id: DeviceId, option: ConfigOption, value: i32) -> Result<()> {
        if option == ConfigOption::Blocking {
            self.set_blocking(value != 0);
            return Ok(());
        }
        self.registry.set_config(id, option, value)
    }

    pub fn set_key_names(&mut self, id: DeviceId, names: KeyNames) -> Result<()> {
        self.registry.set_key_names(id, names)
    }

    fn device_or_last(&self, id: Option<DeviceId>) -> DeviceId {
        id.unwrap_or_else(|| self.menu.last_used_dev())
    }

    /// Name of a raw key; `None` asks about the last used device.
    pub fn key_name(&self, id: Option<DeviceId>, code: u32) -> Cow<'_, str> {
        self.registry.key_name(self.device_or_last(id), code)
    }

    /// Name of the key a device uses for a menu button.
    pub fn menu_key_name(&self, id: Option<DeviceId>, button: MenuButtons) -> Cow<'_, str> {
        let id = self.device_or_last(id);
        let code = self.registry.menu_keycode(id, button).unwrap_or(0);
        self.registry.key_name(id, code)
    }

    pub fn key_code(&self, id: Option<DeviceId>, name: &str) -> Option<u32> {
        self.registry.key_code(self.device_or_last(id), name)
    }

    pub fn bind_key(
        &mut self,
        id: DeviceId,
        key: usize,
        mask: u32,
        bind_type: BindType,
        unbind: bool,
    ) -> Result<()> {
        self.registry.bind_key(id, key, mask, bind_type, unbind)
    }

    pub fn unbind_all(&mut self, id: Option<DeviceId>, mask: u32, bind_type: BindType) {
        self.registry.unbind_all(id, mask, bind_type)
    }

    pub fn dev_binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.registry.dev_binds(id)
    }

    pub fn dev_default_binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.registry.dev_default_binds(id)
    }

    pub fn bind_table(&self, id: DeviceId) -> Option<&BindTable> {
        self.registry.bind_table(id)
    }

    pub fn set_dev_binds(&mut self, id: DeviceId, live: &[u32]) -> Result<()> {
        self.registry.set_dev_binds(id, live)
    }

    pub fn config_parse_dev(&mut self, name: &str) -> Result<DeviceId> {
        self.registry.config_parse_dev(name)
    }

    pub fn config_bind_key(
        &mut self,
        id: DeviceId,
        key: &str,
        actions: u32,
        bind_type: Option<BindType>,
    ) -> Result<()> {
        self.registry.config_bind_key(id, key, actions, bind_type)
    }

    pub fn clean_binds(&mut self) {
        self.registry.clean_binds()
    }

    pub fn dev_name(&self, id: DeviceId, must_be_active: bool, skip_prefix: bool) -> Option<&str> {
        self.registry.dev_name(id, must_be_active, skip_prefix)
    }

    pub fn name_to_id(&self, name: &str) -> Option<DeviceId> {
        self.registry.name_to_id(name)
    }

    pub fn debug_dump(&self) -> String {
        self.registry.debug_dump()
    }
}

impl Default for InputContext {
    fn default() -> Self {
        Self::new(InputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DeviceBackend, KeyEvent, WaitHandle};
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    const UP_KEY: u32 = 103;
    const LEFT_KEY: u32 = 105;
    const OK_KEY: u32 = 28;
    const OTHER_KEY: u32 = 50;

    /// Async-only pad replaying a fixed list of transitions.
    struct Replay(VecDeque<KeyEvent>);

    impl DeviceBackend for Replay {
        fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
            Ok(self.0.pop_front())
        }

        fn menu_button(&self, code: u32) -> MenuButtons {
            match code {
                UP_KEY => MenuButtons::UP,
                LEFT_KEY => MenuButtons::LEFT,
                OK_KEY => MenuButtons::MOK,
                _ => MenuButtons::empty(),
            }
        }

        fn menu_keycode(&self, button: MenuButtons) -> Option<u32> {
            (button == MenuButtons::MOK).then_some(OK_KEY)
        }
    }

    fn context(events: impl IntoIterator<Item = KeyEvent>) -> (InputContext, DeviceId) {
        let config = InputConfig {
            async_poll_interval_ms: 1,
            menu_initial_delay_ms: 20,
            no_device_policy: NoDevicePolicy::Error,
            ..InputConfig::default()
        };
        let mut ctx = InputContext::new(config);
        let backend = Replay(events.into_iter().collect());
        let id = ctx
            .register(DriverId::GpioPad, ProbedDevice::new("gpio:Pad", 128, Box::new(backend)))
            .unwrap();
        (ctx, id)
    }

    #[test]
    fn raw_events_update_held_menu_buttons() {
        let (mut ctx, id) = context([KeyEvent::down(UP_KEY), KeyEvent::down(OTHER_KEY), KeyEvent::up(UP_KEY)]);
        let ev = ctx.update_keycode(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(ev.device, id);
        assert_eq!(ctx.menu_state().held(), MenuButtons::UP);

        ctx.update_keycode(Some(Duration::ZERO)).unwrap();
        assert_eq!(ctx.menu_state().held(), MenuButtons::UP);
        ctx.update_keycode(Some(Duration::ZERO)).unwrap();
        assert_eq!(ctx.menu_state().held(), MenuButtons::empty());
    }

    #[test]
    fn menu_wait_any_skips_non_menu_keys() {
        let (mut ctx, id) = context([KeyEvent::down(OTHER_KEY), KeyEvent::down(OK_KEY)]);
        let held = ctx.menu_wait_any(Some(Duration::from_millis(50))).unwrap();
        assert_eq!(held, MenuButtons::MOK);
        assert_eq!(ctx.menu_state().last_used_dev(), id);
    }

    #[test]
    fn menu_wait_any_times_out_with_unchanged_state() {
        let (mut ctx, _) = context([]);
        let held = ctx.menu_wait_any(Some(Duration::from_millis(5))).unwrap();
        assert_eq!(held, MenuButtons::empty());
    }

    #[test]
    fn menu_wait_drops_horizontal_half_of_diagonal() {
        let (mut ctx, _) = context([KeyEvent::down(LEFT_KEY), KeyEvent::down(UP_KEY)]);
        // LEFT alone isn't interesting, UP+LEFT is
        let result = ctx
            .menu_wait(MenuButtons::UP, Duration::from_millis(5))
            .unwrap();
        assert_eq!(result, MenuButtons::UP);
    }

    #[test]
    fn no_devices_is_an_error_under_error_policy() {
        let config = InputConfig {
            no_device_policy: NoDevicePolicy::Error,
            ..InputConfig::default()
        };
        let mut ctx = InputContext::new(config);
        assert!(matches!(
            ctx.update_keycode(Some(Duration::ZERO)),
            Err(InputError::NoDevices)
        ));
    }

    #[test]
    fn key_names_default_to_last_used_device() {
        let (mut ctx, id) = context([KeyEvent::down(OK_KEY)]);
        ctx.menu_wait_any(Some(Duration::from_millis(20))).unwrap();
        assert_eq!(ctx.menu_state().last_used_dev(), id);
        assert_eq!(ctx.key_name(None, u32::from(b'z')), "z");
        assert_eq!(ctx.menu_key_name(None, MenuButtons::MOK), "\\x1C");
        // no representative key: falls back to code 0
        assert_eq!(ctx.menu_key_name(Some(id), MenuButtons::MENU), "\\x00");
    }

    #[test]
    fn set_blocking_flushes_pending_events() {
        let (mut ctx, _) = context([KeyEvent::down(UP_KEY), KeyEvent::down(OK_KEY)]);
        ctx.set_blocking(true);
        assert_eq!(ctx.menu_state().held(), MenuButtons::UP | MenuButtons::MOK);
        assert_eq!(ctx.update_keycode(Some(Duration::ZERO)).unwrap(), None);
    }

    /// Waitable pad recording the last blocking mode it was given.
    struct Recorder(Rc<Cell<Option<i32>>>);

    impl DeviceBackend for Recorder {
        fn update_keycode(&mut self) -> Result<Option<KeyEvent>> {
            Ok(None)
        }

        fn set_config(&mut self, option: ConfigOption, value: i32) -> Result<()> {
            if option == ConfigOption::Blocking {
                self.0.set(Some(value));
            }
            Ok(())
        }
    }

    struct NeverReady;

    impl HandleWaiter for NeverReady {
        fn wait(&mut self, _: &[WaitHandle], _: Option<Duration>) -> Result<Vec<WaitHandle>> {
            Ok(Vec::new())
        }
    }

    fn register_recorder(ctx: &mut InputContext) -> (DeviceId, Rc<Cell<Option<i32>>>) {
        let seen = Rc::new(Cell::new(None));
        let device = ProbedDevice::new("evdev:Pad", 128, Box::new(Recorder(seen.clone())))
            .with_handle(WaitHandle(7));
        let id = ctx.register(DriverId::Evdev, device).unwrap();
        (id, seen)
    }

    #[test]
    fn blocking_option_goes_through_set_blocking() {
        let (mut ctx, _) = context([KeyEvent::down(UP_KEY)]);
        let (id, seen) = register_recorder(&mut ctx);

        // async pad present: reads stay non-blocking, pending events still flushed
        ctx.set_config(id, ConfigOption::Blocking, 1).unwrap();
        assert_eq!(seen.get(), None);
        assert_eq!(ctx.menu_state().held(), MenuButtons::UP);

        let mut ctx = InputContext::new(InputConfig {
            no_device_policy: NoDevicePolicy::Error,
            ..InputConfig::default()
        });
        ctx.set_waiter(Box::new(NeverReady));
        let (id, seen) = register_recorder(&mut ctx);
        ctx.set_config(id, ConfigOption::Blocking, 1).unwrap();
        assert_eq!(seen.get(), Some(1));
    }

    #[test]
    fn probe_resets_menu_state() {
        let (mut ctx, _) = context([KeyEvent::down(UP_KEY)]);
        ctx.update_keycode(Some(Duration::ZERO)).unwrap();
        ctx.probe();
        assert_eq!(ctx.menu_state().held(), MenuButtons::empty());
    }
}
