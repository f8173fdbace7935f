//! Interactive area selection across every connected display.
//!
//! A session presents one surface per display. Surfaces race to report a
//! result on a shared channel; the session accepts the first report for the
//! live session id and tears every surface down when it commits or cancels.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::display::{Display, DisplayError, DisplaySource};
use crate::geometry::Rect;
use crate::macros::MacroId;

mod hyprland;
pub mod machine;

pub use hyprland::HyprlandSurfaces;
pub use machine::{SelectionMachine, SelectionTransition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Selecting,
    Committed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionEvent {
    Start,
    Commit,
    Cancel,
    Reset,
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("invalid selection transition: from {from:?} using event {event:?}")]
    InvalidTransition {
        from: SelectionState,
        event: SelectionEvent,
    },
    #[error(transparent)]
    Displays(#[from] DisplayError),
    #[error("failed to present selection surface on {display}: {message}")]
    Surface { display: String, message: String },
    #[error("no selection surface could be presented")]
    NoSurfaces,
}

pub type SelectionResult<T> = std::result::Result<T, SelectionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceOutcome {
    /// Area in the reporting display's logical coordinates.
    Selected(Rect),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceReport {
    pub session: u64,
    pub display: String,
    pub outcome: SurfaceOutcome,
}

/// Handed to each surface so it can resolve the session it belongs to.
/// Reports sent after the session was torn down are dropped.
#[derive(Debug, Clone)]
pub struct SurfaceReporter {
    session: u64,
    display: Display,
    sender: mpsc::UnboundedSender<SurfaceReport>,
    cancel: CancellationToken,
}

impl SurfaceReporter {
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn selected(&self, area: Rect) {
        self.send(SurfaceOutcome::Selected(area));
    }

    /// Report a raw drag. The extent may be negative; a zero-area drag
    /// counts as a cancel.
    pub fn dragged(&self, x: i32, y: i32, width: i64, height: i64) {
        match Rect::normalized(x, y, width, height) {
            Some(area) => self.selected(area),
            None => {
                tracing::debug!(display = %self.display.name, "zero-area selection treated as cancel");
                self.cancelled();
            }
        }
    }

    pub fn cancelled(&self) {
        self.send(SurfaceOutcome::Cancelled);
    }

    fn send(&self, outcome: SurfaceOutcome) {
        if self.cancel.is_cancelled() {
            return;
        }
        let report = SurfaceReport {
            session: self.session,
            display: self.display.name.clone(),
            outcome,
        };
        if self.sender.send(report).is_err() {
            tracing::debug!(session = self.session, "selection report receiver closed");
        }
    }
}

/// Windowing side of a selection: full-screen pick surfaces plus control of
/// the settings window that would otherwise sit on top of them.
pub trait SelectionSurfaces {
    fn present_surface(
        &self,
        display: &Display,
        reporter: SurfaceReporter,
    ) -> SelectionResult<SurfaceHandle>;
    fn close_surface(&self, handle: SurfaceHandle);
    fn foreground_focused(&self) -> bool;
    fn hide_foreground(&self);
    fn show_foreground(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session: u64, surfaces: usize },
    AlreadySelecting,
}

#[derive(Debug)]
struct ActiveSelection {
    session: u64,
    target: MacroId,
    handles: Vec<SurfaceHandle>,
    cancel: CancellationToken,
    restore_focus: bool,
}

pub struct SelectionSession<S> {
    displays: Arc<dyn DisplaySource>,
    surfaces: S,
    reports: mpsc::UnboundedSender<SurfaceReport>,
    machine: SelectionMachine,
    active: Option<ActiveSelection>,
    next_session: u64,
}

impl<S: SelectionSurfaces> SelectionSession<S> {
    pub fn new(
        displays: Arc<dyn DisplaySource>,
        surfaces: S,
        reports: mpsc::UnboundedSender<SurfaceReport>,
    ) -> Self {
        Self {
            displays,
            surfaces,
            reports,
            machine: SelectionMachine::new(),
            active: None,
            next_session: 0,
        }
    }

    pub fn state(&self) -> SelectionState {
        self.machine.state()
    }

    pub fn is_selecting(&self) -> bool {
        self.machine.state() == SelectionState::Selecting
    }

    pub fn target(&self) -> Option<MacroId> {
        self.active.as_ref().map(|active| active.target)
    }

    pub fn surfaces(&self) -> &S {
        &self.surfaces
    }

    pub fn start(&mut self, target: MacroId) -> SelectionResult<StartOutcome> {
        if self.is_selecting() {
            tracing::debug!(%target, "selection already active; ignoring start");
            return Ok(StartOutcome::AlreadySelecting);
        }

        let displays = self.displays.list_displays()?;
        if displays.is_empty() {
            return Err(DisplayError::NoDisplays.into());
        }

        let restore_focus = self.surfaces.foreground_focused();
        self.surfaces.hide_foreground();
        self.machine.transition(SelectionEvent::Start)?;

        self.next_session += 1;
        let session = self.next_session;
        let cancel = CancellationToken::new();
        let mut handles = Vec::with_capacity(displays.len());
        for display in &displays {
            let reporter = SurfaceReporter {
                session,
                display: display.clone(),
                sender: self.reports.clone(),
                cancel: cancel.clone(),
            };
            match self.surfaces.present_surface(display, reporter) {
                Ok(handle) => handles.push(handle),
                Err(err) => tracing::warn!(%err, "skipping selection surface"),
            }
        }

        let surfaces = handles.len();
        self.active = Some(ActiveSelection {
            session,
            target,
            handles,
            cancel,
            restore_focus,
        });

        if surfaces == 0 {
            self.cancel()?;
            return Err(SelectionError::NoSurfaces);
        }

        tracing::info!(%target, session, surfaces, "area selection started");
        Ok(StartOutcome::Started { session, surfaces })
    }

    /// Returns the outcome when `report` belongs to the live session.
    pub fn accept(&self, report: &SurfaceReport) -> Option<SurfaceOutcome> {
        match &self.active {
            Some(active) if active.session == report.session && self.is_selecting() => {
                Some(report.outcome)
            }
            _ => {
                tracing::debug!(
                    session = report.session,
                    display = %report.display,
                    "dropping stale selection report"
                );
                None
            }
        }
    }

    /// Hands `(target, area)` to `persist` before any surface is torn down.
    pub fn commit<R>(
        &mut self,
        area: Rect,
        persist: impl FnOnce(MacroId, Rect) -> R,
    ) -> SelectionResult<R> {
        self.machine.transition(SelectionEvent::Commit)?;
        let Some(active) = self.active.take() else {
            self.machine.transition(SelectionEvent::Reset)?;
            return Err(SelectionError::InvalidTransition {
                from: SelectionState::Idle,
                event: SelectionEvent::Commit,
            });
        };

        tracing::info!(target = %active.target, %area, "area selection committed");
        let persisted = persist(active.target, area);
        self.finish(active)?;
        Ok(persisted)
    }

    pub fn cancel(&mut self) -> SelectionResult<Option<MacroId>> {
        self.machine.transition(SelectionEvent::Cancel)?;
        let target = match self.active.take() {
            Some(active) => {
                let target = active.target;
                self.finish(active)?;
                Some(target)
            }
            None => {
                self.machine.transition(SelectionEvent::Reset)?;
                None
            }
        };
        tracing::info!(target = ?target, "area selection cancelled");
        Ok(target)
    }

    /// Cancels the live session if it targets `id`.
    pub fn cancel_targeting(&mut self, id: MacroId) -> SelectionResult<bool> {
        if self.target() != Some(id) || !self.is_selecting() {
            return Ok(false);
        }
        self.cancel().map(|_| true)
    }

    fn finish(&mut self, active: ActiveSelection) -> SelectionResult<()> {
        active.cancel.cancel();
        for handle in active.handles {
            self.surfaces.close_surface(handle);
        }
        if active.restore_focus {
            self.surfaces.show_foreground();
        }
        self.machine.transition(SelectionEvent::Reset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Mutex;

    use crate::display::DisplayResult;

    struct FakeDisplays {
        displays: Mutex<Vec<Display>>,
    }

    impl DisplaySource for FakeDisplays {
        fn list_displays(&self) -> DisplayResult<Vec<Display>> {
            Ok(self.displays.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeSurfaces {
        log: Rc<RefCell<Vec<String>>>,
        reporters: Rc<RefCell<Vec<SurfaceReporter>>>,
        focused: bool,
        refuse: bool,
    }

    impl SelectionSurfaces for FakeSurfaces {
        fn present_surface(
            &self,
            display: &Display,
            reporter: SurfaceReporter,
        ) -> SelectionResult<SurfaceHandle> {
            if self.refuse {
                return Err(SelectionError::Surface {
                    display: display.name.clone(),
                    message: "no layer shell".to_string(),
                });
            }
            self.log.borrow_mut().push(format!("present {}", display.name));
            let mut reporters = self.reporters.borrow_mut();
            reporters.push(reporter);
            Ok(SurfaceHandle(reporters.len() as u64))
        }

        fn close_surface(&self, handle: SurfaceHandle) {
            self.log.borrow_mut().push(format!("close {}", handle.0));
        }

        fn foreground_focused(&self) -> bool {
            self.focused
        }

        fn hide_foreground(&self) {
            self.log.borrow_mut().push("hide".to_string());
        }

        fn show_foreground(&self) {
            self.log.borrow_mut().push("show".to_string());
        }
    }

    fn display(name: &str, x: i32) -> Display {
        Display {
            name: name.to_string(),
            bounds: Rect::new(x, 0, 1920, 1080),
        }
    }

    struct Harness {
        session: SelectionSession<FakeSurfaces>,
        displays: Arc<FakeDisplays>,
        reports: mpsc::UnboundedReceiver<SurfaceReport>,
        log: Rc<RefCell<Vec<String>>>,
        reporters: Rc<RefCell<Vec<SurfaceReporter>>>,
    }

    fn harness(focused: bool) -> Harness {
        let displays = Arc::new(FakeDisplays {
            displays: Mutex::new(vec![display("DP-1", 0), display("HDMI-A-1", 1920)]),
        });
        let surfaces = FakeSurfaces {
            focused,
            ..FakeSurfaces::default()
        };
        let log = surfaces.log.clone();
        let reporters = surfaces.reporters.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        Harness {
            session: SelectionSession::new(displays.clone(), surfaces, tx),
            displays,
            reports: rx,
            log,
            reporters,
        }
    }

    #[test]
    fn second_start_is_dropped_while_selecting() {
        let mut h = harness(false);
        let target = MacroId::new();

        let first = h.session.start(target).unwrap();
        let second = h.session.start(MacroId::new()).unwrap();

        assert_eq!(first, StartOutcome::Started { session: 1, surfaces: 2 });
        assert_eq!(second, StartOutcome::AlreadySelecting);
        assert_eq!(h.session.target(), Some(target));
        assert_eq!(h.reporters.borrow().len(), 2);
    }

    #[test]
    fn every_start_requeries_the_display_list() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();
        h.session.cancel().unwrap();

        h.displays.displays.lock().unwrap().pop();
        let outcome = h.session.start(MacroId::new()).unwrap();

        assert_eq!(outcome, StartOutcome::Started { session: 2, surfaces: 1 });
    }

    #[test]
    fn commit_persists_before_teardown_and_restores_focused_ui() {
        let mut h = harness(true);
        let target = MacroId::new();
        h.session.start(target).unwrap();
        let area = Rect::new(10, 20, 300, 200);

        let log = h.log.clone();
        let persisted = h
            .session
            .commit(area, |id, rect| {
                log.borrow_mut().push("persist".to_string());
                (id, rect)
            })
            .unwrap();

        assert_eq!(persisted, (target, area));
        assert_eq!(
            *h.log.borrow(),
            vec![
                "hide",
                "present DP-1",
                "present HDMI-A-1",
                "persist",
                "close 1",
                "close 2",
                "show"
            ]
        );
        assert_eq!(h.session.state(), SelectionState::Idle);
    }

    #[test]
    fn unfocused_ui_is_not_restored() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();

        h.session.cancel().unwrap();

        assert!(!h.log.borrow().iter().any(|entry| entry == "show"));
        assert!(!h.session.is_selecting());
    }

    #[test]
    fn first_report_wins_and_later_ones_are_dropped() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();
        let reporters = h.reporters.borrow().clone();

        reporters[1].selected(Rect::new(5, 5, 50, 50));
        let report = h.reports.try_recv().unwrap();
        let outcome = h.session.accept(&report);
        assert_eq!(outcome, Some(SurfaceOutcome::Selected(Rect::new(5, 5, 50, 50))));
        h.session.commit(Rect::new(5, 5, 50, 50), |_, _| ()).unwrap();

        reporters[0].selected(Rect::new(1, 1, 10, 10));
        assert!(h.reports.try_recv().is_err());
        assert!(reporters[0].cancellation().is_cancelled());
    }

    #[test]
    fn report_from_previous_session_is_stale() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();
        h.session.cancel().unwrap();
        h.session.start(MacroId::new()).unwrap();

        let stale = SurfaceReport {
            session: 1,
            display: "DP-1".to_string(),
            outcome: SurfaceOutcome::Cancelled,
        };

        assert_eq!(h.session.accept(&stale), None);
        assert!(h.session.is_selecting());
    }

    #[test]
    fn zero_area_drag_reports_cancel() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();
        let reporter = h.reporters.borrow()[0].clone();

        reporter.dragged(100, 100, 0, 40);

        assert_eq!(h.reports.try_recv().unwrap().outcome, SurfaceOutcome::Cancelled);
    }

    #[test]
    fn negative_drag_is_normalized() {
        let mut h = harness(false);
        h.session.start(MacroId::new()).unwrap();
        let reporter = h.reporters.borrow()[0].clone();

        reporter.dragged(300, 200, -100, -50);

        assert_eq!(
            h.reports.try_recv().unwrap().outcome,
            SurfaceOutcome::Selected(Rect::new(200, 150, 100, 50))
        );
    }

    #[test]
    fn commit_without_session_is_rejected() {
        let mut h = harness(false);

        let err = h.session.commit(Rect::new(0, 0, 1, 1), |_, _| ()).unwrap_err();

        assert!(matches!(
            err,
            SelectionError::InvalidTransition {
                from: SelectionState::Idle,
                event: SelectionEvent::Commit
            }
        ));
    }

    #[test]
    fn cancel_targeting_only_cancels_matching_session() {
        let mut h = harness(false);
        let target = MacroId::new();
        h.session.start(target).unwrap();

        assert!(!h.session.cancel_targeting(MacroId::new()).unwrap());
        assert!(h.session.is_selecting());
        assert!(h.session.cancel_targeting(target).unwrap());
        assert!(!h.session.is_selecting());
    }

    #[test]
    fn no_presentable_surface_returns_to_idle() {
        let displays = Arc::new(FakeDisplays {
            displays: Mutex::new(vec![display("DP-1", 0)]),
        });
        let surfaces = FakeSurfaces {
            focused: true,
            refuse: true,
            ..FakeSurfaces::default()
        };
        let log = surfaces.log.clone();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut session = SelectionSession::new(displays, surfaces, tx);

        let err = session.start(MacroId::new()).unwrap_err();

        assert!(matches!(err, SelectionError::NoSurfaces));
        assert_eq!(session.state(), SelectionState::Idle);
        assert_eq!(*log.borrow(), vec!["hide", "show"]);
    }
}
