//! Event dispatch loop
//!
//! The loop blocks for the next event, routes it to exactly one handler
//! method, and repeats. Events are handled strictly in the order the server
//! sent them, one per step.

use super::Connection;
use crate::backend::{DisplayServer, Incoming};
use crate::error::{ProtocolError, SessionError, SessionResult};
use crate::protocol::*;

/// Whether the loop keeps going after a handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    Stop,
}

/// Reactions to the events a session cares about.
///
/// Every method defaults to doing nothing and continuing.
pub trait EventHandler {
    /// Part of the window became visible and should be redrawn
    fn expose(&mut self, _event: &ExposeEvent) -> ControlFlow {
        ControlFlow::Continue
    }

    /// The keyboard or pointer mapping changed on the server
    fn mapping_notify(&mut self, _event: &MappingNotifyEvent) -> ControlFlow {
        ControlFlow::Continue
    }

    fn button_press(&mut self, _event: &ButtonPressEvent) -> ControlFlow {
        ControlFlow::Continue
    }

    fn key_press(&mut self, _event: &KeyPressEvent) -> ControlFlow {
        ControlFlow::Continue
    }

    /// A known event kind without a dedicated method
    fn unhandled(&mut self, _event: &Event) -> ControlFlow {
        ControlFlow::Continue
    }
}

/// Why a loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// A handler asked to stop
    Requested,
    /// An event with an unknown tag arrived
    Protocol(ProtocolError),
    /// Reading from the server failed
    Transport(std::io::ErrorKind),
}

pub struct EventLoop<'c, S: DisplayServer> {
    conn: &'c Connection<S>,
    termination: Option<Termination>,
    dispatched: u64,
}

impl<'c, S: DisplayServer> EventLoop<'c, S> {
    pub fn new(conn: &'c Connection<S>) -> Self {
        EventLoop {
            conn,
            termination: None,
            dispatched: 0,
        }
    }

    /// Events handed to a handler so far
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }

    /// Wait for one event and dispatch it.
    ///
    /// Asynchronous errors met while waiting go to the connection's error
    /// handler and do not count as a step. After termination this returns
    /// `Stop` without reading anything.
    pub fn step<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> SessionResult<ControlFlow> {
        if self.termination.is_some() {
            return Ok(ControlFlow::Stop);
        }

        let event = loop {
            log::debug!("Waiting for next event...");
            match self.conn.next_incoming() {
                Ok(Incoming::Event(event)) => break event,
                Ok(Incoming::Error(error)) => self.conn.report_error(&error),
                Err(e) => {
                    log::debug!("Event read failed: {}", e);
                    self.termination = Some(Termination::Transport(e.kind()));
                    return Err(SessionError::Transport(e));
                }
            }
        };

        let flow = match &event {
            Event::Expose(e) => {
                log::debug!("Expose on {} ({}x{}+{}+{})", e.window, e.width, e.height, e.x, e.y);
                handler.expose(e)
            }
            Event::MappingNotify(e) => {
                log::debug!("Mapping changed: {:?}", e.request);
                handler.mapping_notify(e)
            }
            Event::ButtonPress(e) => {
                log::debug!("Button {} at {},{}", e.detail.get(), e.event_x, e.event_y);
                handler.button_press(e)
            }
            Event::KeyPress(e) => {
                log::debug!("Key {} (state {:?})", e.detail.get(), e.state);
                handler.key_press(e)
            }
            Event::Unknown(e) => {
                let error = ProtocolError {
                    code: e.code,
                    sequence: e.sequence,
                };
                log::error!("{}", error);
                self.termination = Some(Termination::Protocol(error.clone()));
                return Err(error.into());
            }
            other => handler.unhandled(other),
        };

        self.dispatched += 1;
        if flow == ControlFlow::Stop {
            log::info!("Event loop stopped after {} events", self.dispatched);
            self.termination = Some(Termination::Requested);
        }
        Ok(flow)
    }

    /// Step until a handler stops the loop or it fails
    pub fn run<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> SessionResult<()> {
        while self.step(handler)? == ControlFlow::Continue {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockHandle;
    use crate::session::{ClientWindow, WindowSpec};

    #[derive(Default)]
    struct Recorder {
        seen: Vec<&'static str>,
        stop_after: Option<usize>,
    }

    impl Recorder {
        fn note(&mut self, what: &'static str) -> ControlFlow {
            self.seen.push(what);
            match self.stop_after {
                Some(n) if self.seen.len() >= n => ControlFlow::Stop,
                _ => ControlFlow::Continue,
            }
        }
    }

    impl EventHandler for Recorder {
        fn expose(&mut self, _event: &ExposeEvent) -> ControlFlow {
            self.note("expose")
        }
        fn mapping_notify(&mut self, _event: &MappingNotifyEvent) -> ControlFlow {
            self.note("mapping")
        }
        fn button_press(&mut self, _event: &ButtonPressEvent) -> ControlFlow {
            self.note("button")
        }
        fn key_press(&mut self, _event: &KeyPressEvent) -> ControlFlow {
            self.note("key")
        }
        fn unhandled(&mut self, _event: &Event) -> ControlFlow {
            self.note("other")
        }
    }

    fn expose(window: Window) -> Event {
        Event::Expose(ExposeEvent {
            sequence: 0,
            send_event: false,
            window,
            x: 0,
            y: 0,
            width: 350,
            height: 250,
            count: 0,
        })
    }

    fn key(window: Window) -> Event {
        Event::KeyPress(KeyPressEvent {
            detail: Keycode(24),
            sequence: 0,
            send_event: false,
            time: Timestamp(0),
            root: Window::new(0x1e1),
            event: window,
            child: Window::NONE,
            root_x: 0,
            root_y: 0,
            event_x: 5,
            event_y: 5,
            state: ModMask::empty(),
            same_screen: true,
        })
    }

    fn button(window: Window) -> Event {
        Event::ButtonPress(ButtonPressEvent {
            detail: Button::BUTTON1,
            sequence: 0,
            send_event: false,
            time: Timestamp(0),
            root: Window::new(0x1e1),
            event: window,
            child: Window::NONE,
            root_x: 0,
            root_y: 0,
            event_x: 5,
            event_y: 5,
            state: ModMask::empty(),
            same_screen: true,
        })
    }

    fn mapping() -> Event {
        Event::MappingNotify(MappingNotifyEvent {
            sequence: 0,
            send_event: false,
            request: Mapping::Keyboard,
            first_keycode: Keycode(8),
            count: 248,
        })
    }

    fn selected_window<'c>(
        conn: &'c Connection<crate::backend::mock::MockServer>,
        mask: EventMask,
    ) -> ClientWindow<'c, crate::backend::mock::MockServer> {
        let window = conn
            .create_window(&WindowSpec::new(Rectangle::new(200, 300, 350, 250), 5))
            .unwrap();
        window.select_events(mask).unwrap();
        window
    }

    const DEMO_MASK: EventMask = EventMask::BUTTON_PRESS
        .union(EventMask::KEY_PRESS)
        .union(EventMask::EXPOSURE);

    #[test]
    fn test_dispatch_follows_server_order() {
        let handle = MockHandle::new(11, 0);
        let conn = Connection::new(handle.server());
        let window = selected_window(&conn, DEMO_MASK);

        handle.push_event(key(window.id()));
        handle.push_event(mapping());
        handle.push_event(expose(window.id()));
        handle.push_event(button(window.id()));
        handle.push_event(expose(window.id()));

        let mut recorder = Recorder {
            stop_after: Some(5),
            ..Default::default()
        };
        let mut events = EventLoop::new(&conn);
        events.run(&mut recorder).unwrap();

        assert_eq!(recorder.seen, vec!["key", "mapping", "expose", "button", "expose"]);
        assert_eq!(events.dispatched(), 5);
        assert_eq!(events.termination(), Some(&Termination::Requested));
    }

    #[test]
    fn test_single_expose_keeps_loop_running() {
        let handle = MockHandle::new(11, 0);
        let conn = Connection::new(handle.server());
        let window = selected_window(&conn, DEMO_MASK);
        handle.push_event(expose(window.id()));

        let mut recorder = Recorder::default();
        let mut events = EventLoop::new(&conn);
        assert_eq!(events.step(&mut recorder).unwrap(), ControlFlow::Continue);
        assert_eq!(recorder.seen, vec!["expose"]);
        assert!(!events.is_terminated());
    }

    #[test]
    fn test_unselected_kinds_are_never_dispatched() {
        let masks = [
            EventMask::empty(),
            EventMask::KEY_PRESS,
            EventMask::EXPOSURE,
            EventMask::BUTTON_PRESS | EventMask::KEY_PRESS,
            DEMO_MASK,
        ];
        for mask in masks {
            let handle = MockHandle::new(11, 0);
            let conn = Connection::new(handle.server());
            let window = selected_window(&conn, mask);

            handle.push_event(key(window.id()));
            handle.push_event(button(window.id()));
            handle.push_event(expose(window.id()));
            handle.push_event(mapping());

            let mut recorder = Recorder::default();
            let mut events = EventLoop::new(&conn);
            assert!(matches!(
                events.run(&mut recorder),
                Err(SessionError::Transport(_))
            ));

            let mut expected = Vec::new();
            let mut filtered = 0;
            for (bit, name) in [
                (EventMask::KEY_PRESS, "key"),
                (EventMask::BUTTON_PRESS, "button"),
                (EventMask::EXPOSURE, "expose"),
            ] {
                if mask.contains(bit) {
                    expected.push(name);
                } else {
                    filtered += 1;
                }
            }
            // MappingNotify cannot be deselected
            expected.push("mapping");

            assert_eq!(recorder.seen, expected, "mask {:?}", mask);
            assert_eq!(events.dispatched(), expected.len() as u64);
            assert_eq!(handle.filtered(), filtered, "mask {:?}", mask);
        }
    }

    #[test]
    fn test_unknown_tag_terminates_with_protocol_error() {
        let handle = MockHandle::new(11, 0);
        let conn = Connection::new(handle.server());
        let window = selected_window(&conn, DEMO_MASK);

        handle.push_event(expose(window.id()));
        handle.push_event(Event::Unknown(UnknownEvent {
            code: 9999,
            sequence: 7,
            send_event: false,
        }));
        handle.push_event(key(window.id()));

        let mut recorder = Recorder::default();
        let mut events = EventLoop::new(&conn);
        let err = events.run(&mut recorder).unwrap_err();

        assert!(matches!(
            err,
            SessionError::Protocol(ProtocolError { code: 9999, sequence: 7 })
        ));
        assert_ne!(err.exit_code(), 0);
        assert_eq!(recorder.seen, vec!["expose"]);

        // Terminated loops never read or dispatch again
        assert_eq!(events.step(&mut recorder).unwrap(), ControlFlow::Stop);
        assert_eq!(recorder.seen, vec!["expose"]);
        assert_eq!(handle.queued(), 1);
    }

    #[test]
    fn test_async_errors_go_to_handler_not_loop() {
        let handle = MockHandle::new(11, 0);
        let mut conn = Connection::new(handle.server());
        let reported = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = std::rc::Rc::clone(&reported);
        conn.set_error_handler(move |_, _| counter.set(counter.get() + 1));

        let window = selected_window(&conn, DEMO_MASK);
        handle.push_error(X11Error::new(ErrorCode::Value, 3, 0, 2));
        handle.push_event(expose(window.id()));

        let mut recorder = Recorder::default();
        let mut events = EventLoop::new(&conn);
        events.step(&mut recorder).unwrap();
        assert_eq!(reported.get(), 1);
        assert_eq!(recorder.seen, vec!["expose"]);
        assert_eq!(events.dispatched(), 1);
    }

    #[test]
    fn test_recognised_kinds_without_method_are_ignored() {
        let handle = MockHandle::new(11, 0);
        let conn = Connection::new(handle.server());
        let _window = selected_window(&conn, DEMO_MASK);

        let mut raw = [0u8; 32];
        raw[0] = EventType::SelectionClear as u8;
        handle.push_event(Event::parse(&raw).unwrap());

        let mut recorder = Recorder::default();
        let mut events = EventLoop::new(&conn);
        assert_eq!(events.step(&mut recorder).unwrap(), ControlFlow::Continue);
        assert_eq!(recorder.seen, vec!["other"]);
    }

    #[test]
    fn test_transport_failure_terminates() {
        let handle = MockHandle::new(11, 0);
        let conn = Connection::new(handle.server());
        let mut events = EventLoop::new(&conn);
        let err = events.run(&mut Recorder::default()).unwrap_err();
        assert!(matches!(err, SessionError::Transport(_)));
        assert_eq!(err.exit_code(), 4);
        assert!(matches!(events.termination(), Some(Termination::Transport(_))));
    }
}
