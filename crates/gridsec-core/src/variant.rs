//! Variant storage.
//!
//! A variant is a complete, independently mutable copy of everything that
//! changes during an analysis: connection status, injections, solved voltages
//! and flows. The static topology is shared by all variants.
//!
//! With multi-thread access disabled there is one working variant for the
//! whole network. Once [`VariantManager::allow_multi_thread_access`] is turned
//! on, every thread selects its own working variant, so parallel contingency
//! workers never observe each other's choice.

use crate::error::{GridSecError, GridSecResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Id of the variant every network starts with. It cannot be removed.
pub const INITIAL_VARIANT_ID: &str = "InitialState";

static NEXT_MANAGER_UID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    // manager uid -> working variant id of the current thread
    static THREAD_WORKING_VARIANTS: RefCell<HashMap<u64, String>> = RefCell::new(HashMap::new());
}

/// Solved bus quantities. NaN means "not computed".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusState {
    /// Voltage magnitude (kV)
    pub v: f64,
    /// Voltage angle (degrees)
    pub angle: f64,
}

impl Default for BusState {
    fn default() -> Self {
        Self {
            v: f64::NAN,
            angle: f64::NAN,
        }
    }
}

impl BusState {
    pub fn is_solved(&self) -> bool {
        self.v.is_finite() && self.angle.is_finite()
    }
}

/// One end of a branch or transformer leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalState {
    pub connected: bool,
    /// Active power entering the element (MW)
    pub p: f64,
    /// Reactive power entering the element (Mvar)
    pub q: f64,
    /// Current magnitude (A)
    pub i: f64,
}

impl TerminalState {
    pub fn new(connected: bool) -> Self {
        Self {
            connected,
            p: f64::NAN,
            q: f64::NAN,
            i: f64::NAN,
        }
    }

    pub fn clear_flows(&mut self) {
        self.p = f64::NAN;
        self.q = f64::NAN;
        self.i = f64::NAN;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchState {
    pub terminal1: TerminalState,
    pub terminal2: TerminalState,
}

impl BranchState {
    pub fn new(connected: bool) -> Self {
        Self {
            terminal1: TerminalState::new(connected),
            terminal2: TerminalState::new(connected),
        }
    }

    /// Both ends closed, so the branch carries flow.
    pub fn is_connected(&self) -> bool {
        self.terminal1.connected && self.terminal2.connected
    }

    pub fn terminal(&self, side: crate::TwoSides) -> &TerminalState {
        match side {
            crate::TwoSides::One => &self.terminal1,
            crate::TwoSides::Two => &self.terminal2,
        }
    }

    pub fn terminal_mut(&mut self, side: crate::TwoSides) -> &mut TerminalState {
        match side {
            crate::TwoSides::One => &mut self.terminal1,
            crate::TwoSides::Two => &mut self.terminal2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreeWindingsState {
    pub legs: [TerminalState; 3],
    /// Star point voltage (per-unit), NaN until solved
    pub star_v: f64,
    /// Star point angle (radians), NaN until solved
    pub star_angle: f64,
}

impl ThreeWindingsState {
    pub fn new(connected: bool) -> Self {
        Self {
            legs: [TerminalState::new(connected); 3],
            star_v: f64::NAN,
            star_angle: f64::NAN,
        }
    }

    pub fn leg(&self, side: crate::ThreeSides) -> &TerminalState {
        &self.legs[side.index()]
    }
}

/// Generator output or load consumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectionState {
    pub connected: bool,
    /// Active power (MW); generators produce, loads consume
    pub p: f64,
    /// Reactive power (Mvar)
    pub q: f64,
}

impl InjectionState {
    pub fn new(connected: bool, p: f64, q: f64) -> Self {
        Self { connected, p, q }
    }
}

/// Everything a contingency or a power flow may change.
///
/// Vectors are indexed like the network: buses by `NodeIndex::index()`,
/// branches and HVDC lines by `EdgeIndex::index()`, the others by their
/// position in the network's element lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariantState {
    pub buses: Vec<BusState>,
    pub branches: Vec<BranchState>,
    pub three_windings: Vec<ThreeWindingsState>,
    pub generators: Vec<InjectionState>,
    pub loads: Vec<InjectionState>,
}

impl VariantState {
    /// Forget every solved quantity, keeping topology and setpoints.
    pub fn clear_solution(&mut self) {
        for bus in &mut self.buses {
            *bus = BusState::default();
        }
        for branch in &mut self.branches {
            branch.terminal1.clear_flows();
            branch.terminal2.clear_flows();
        }
        for transformer in &mut self.three_windings {
            for leg in &mut transformer.legs {
                leg.clear_flows();
            }
            transformer.star_v = f64::NAN;
            transformer.star_angle = f64::NAN;
        }
    }
}

type SharedState = Arc<RwLock<VariantState>>;

#[derive(Debug)]
pub struct VariantManager {
    uid: u64,
    variants: RwLock<HashMap<String, SharedState>>,
    working: Mutex<String>,
    multi_thread: AtomicBool,
}

impl VariantManager {
    pub(crate) fn new(initial: VariantState) -> Self {
        let mut variants = HashMap::new();
        variants.insert(
            INITIAL_VARIANT_ID.to_string(),
            Arc::new(RwLock::new(initial)),
        );
        Self {
            uid: NEXT_MANAGER_UID.fetch_add(1, Ordering::Relaxed),
            variants: RwLock::new(variants),
            working: Mutex::new(INITIAL_VARIANT_ID.to_string()),
            multi_thread: AtomicBool::new(false),
        }
    }

    pub fn variant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.variants.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn variant_count(&self) -> usize {
        self.variants.read().len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.variants.read().contains_key(id)
    }

    pub fn variant(&self, id: &str) -> GridSecResult<SharedState> {
        self.variants
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| GridSecError::Variant(format!("unknown variant '{id}'")))
    }

    /// Deep-copy `source` into a new variant `target`.
    pub fn clone_variant(&self, source: &str, target: &str) -> GridSecResult<()> {
        if target.is_empty() {
            return Err(GridSecError::Variant("variant id cannot be empty".into()));
        }
        let snapshot = self.variant(source)?.read().clone();
        let mut map = self.variants.write();
        if map.contains_key(target) {
            return Err(GridSecError::Variant(format!(
                "variant '{target}' already exists"
            )));
        }
        map.insert(target.to_string(), Arc::new(RwLock::new(snapshot)));
        Ok(())
    }

    pub fn remove_variant(&self, id: &str) -> GridSecResult<()> {
        if id == INITIAL_VARIANT_ID {
            return Err(GridSecError::Variant(
                "the initial variant cannot be removed".into(),
            ));
        }
        {
            if self.variants.write().remove(id).is_none() {
                return Err(GridSecError::Variant(format!("unknown variant '{id}'")));
            }
        }
        let uid = self.uid;
        THREAD_WORKING_VARIANTS.with(|cell| {
            let mut working = cell.borrow_mut();
            if working.get(&uid).map(String::as_str) == Some(id) {
                working.remove(&uid);
            }
        });
        let mut shared = self.working.lock();
        if shared.as_str() == id {
            *shared = INITIAL_VARIANT_ID.to_string();
        }
        Ok(())
    }

    pub fn allow_multi_thread_access(&self, allow: bool) {
        self.multi_thread.store(allow, Ordering::SeqCst);
    }

    pub fn is_multi_thread_access_allowed(&self) -> bool {
        self.multi_thread.load(Ordering::SeqCst)
    }

    pub fn set_working_variant(&self, id: &str) -> GridSecResult<()> {
        if !self.contains(id) {
            return Err(GridSecError::Variant(format!("unknown variant '{id}'")));
        }
        if self.is_multi_thread_access_allowed() {
            let uid = self.uid;
            THREAD_WORKING_VARIANTS.with(|cell| {
                cell.borrow_mut().insert(uid, id.to_string());
            });
        } else {
            *self.working.lock() = id.to_string();
        }
        Ok(())
    }

    /// In multi-thread mode each thread must pick its variant first.
    pub fn working_variant_id(&self) -> GridSecResult<String> {
        if self.is_multi_thread_access_allowed() {
            let uid = self.uid;
            THREAD_WORKING_VARIANTS
                .with(|cell| cell.borrow().get(&uid).cloned())
                .ok_or_else(|| {
                    GridSecError::Variant("working variant not set for this thread".into())
                })
        } else {
            Ok(self.working.lock().clone())
        }
    }

    pub fn working_variant(&self) -> GridSecResult<SharedState> {
        let id = self.working_variant_id()?;
        self.variant(&id)
    }

    /// Clone `source` into `target` and remove `target` again when the guard drops.
    pub fn scoped_clone(&self, source: &str, target: &str) -> GridSecResult<ScopedVariant<'_>> {
        self.clone_variant(source, target)?;
        let state = self.variant(target)?;
        Ok(ScopedVariant {
            manager: self,
            id: target.to_string(),
            state,
        })
    }
}

/// A variant that is removed from its manager on drop, on every exit path.
#[derive(Debug)]
pub struct ScopedVariant<'a> {
    manager: &'a VariantManager,
    id: String,
    state: SharedState,
}

impl ScopedVariant<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }
}

impl Drop for ScopedVariant<'_> {
    fn drop(&mut self) {
        // The variant may already be gone if a caller removed it by hand.
        let _ = self.manager.remove_variant(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> VariantManager {
        VariantManager::new(VariantState {
            buses: vec![BusState::default(); 2],
            branches: vec![BranchState::new(true)],
            three_windings: Vec::new(),
            generators: Vec::new(),
            loads: Vec::new(),
        })
    }

    #[test]
    fn clone_is_isolated_from_source() {
        let manager = manager();
        manager.clone_variant(INITIAL_VARIANT_ID, "v1").unwrap();
        {
            let v1 = manager.variant("v1").unwrap();
            let mut state = v1.write();
            state.branches[0].terminal1.connected = false;
        }
        let initial = manager.variant(INITIAL_VARIANT_ID).unwrap();
        assert!(initial.read().branches[0].terminal1.connected);
        assert_eq!(manager.variant_count(), 2);
    }

    #[test]
    fn duplicate_and_unknown_ids_are_errors() {
        let manager = manager();
        manager.clone_variant(INITIAL_VARIANT_ID, "v1").unwrap();
        assert!(manager.clone_variant(INITIAL_VARIANT_ID, "v1").is_err());
        assert!(manager.clone_variant("missing", "v2").is_err());
        assert!(manager.remove_variant("missing").is_err());
        assert!(manager.remove_variant(INITIAL_VARIANT_ID).is_err());
        assert!(manager.set_working_variant("missing").is_err());
    }

    #[test]
    fn scoped_variant_is_removed_on_drop() {
        let manager = manager();
        {
            let scoped = manager.scoped_clone(INITIAL_VARIANT_ID, "tmp").unwrap();
            assert_eq!(scoped.id(), "tmp");
            assert!(manager.contains("tmp"));
        }
        assert!(!manager.contains("tmp"));
        assert_eq!(manager.variant_count(), 1);
    }

    #[test]
    fn panic_under_the_storage_lock_keeps_variants_visible() {
        let manager = Arc::new(manager());
        manager.clone_variant(INITIAL_VARIANT_ID, "leaked").unwrap();

        let other = Arc::clone(&manager);
        let outcome = std::thread::spawn(move || {
            let _map = other.variants.write();
            panic!("worker died while holding the storage lock");
        })
        .join();
        assert!(outcome.is_err());

        assert_eq!(manager.variant_count(), 2);
        assert!(manager.contains("leaked"));
        assert_eq!(manager.variant_ids(), vec![INITIAL_VARIANT_ID, "leaked"]);
        manager.remove_variant("leaked").unwrap();
        assert_eq!(manager.variant_count(), 1);
    }

    #[test]
    fn scoped_variant_is_removed_when_its_worker_panics() {
        let manager = manager();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let scoped = manager.scoped_clone(INITIAL_VARIANT_ID, "tmp").unwrap();
            let _state = scoped.state().write();
            panic!("contingency failed mid-solve");
        }));
        assert!(outcome.is_err());
        assert!(!manager.contains("tmp"));
        assert_eq!(manager.variant_count(), 1);
    }

    #[test]
    fn removing_the_working_variant_falls_back_to_initial() {
        let manager = manager();
        manager.clone_variant(INITIAL_VARIANT_ID, "v1").unwrap();
        manager.set_working_variant("v1").unwrap();
        assert_eq!(manager.working_variant_id().unwrap(), "v1");
        manager.remove_variant("v1").unwrap();
        assert_eq!(manager.working_variant_id().unwrap(), INITIAL_VARIANT_ID);
    }

    #[test]
    fn multi_thread_mode_gives_each_thread_its_own_working_variant() {
        let manager = Arc::new(manager());
        manager.clone_variant(INITIAL_VARIANT_ID, "a").unwrap();
        manager.clone_variant(INITIAL_VARIANT_ID, "b").unwrap();
        manager.allow_multi_thread_access(true);

        assert!(manager.working_variant_id().is_err());
        manager.set_working_variant("a").unwrap();

        let other = Arc::clone(&manager);
        let seen_by_other = std::thread::spawn(move || {
            other.set_working_variant("b").unwrap();
            other.working_variant_id().unwrap()
        })
        .join()
        .unwrap();

        assert_eq!(seen_by_other, "b");
        assert_eq!(manager.working_variant_id().unwrap(), "a");

        manager.allow_multi_thread_access(false);
        assert_eq!(manager.working_variant_id().unwrap(), INITIAL_VARIANT_ID);
    }
}
