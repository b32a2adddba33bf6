//! Global key capture using the X11 RECORD extension
//!
//! Two connections are used: the control connection creates, disables and
//! frees the record context (and is shared with the keyboard for layout
//! queries and injection), the data connection blocks in
//! RecordEnableContext and receives the recorded protocol stream.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};
use x11rb::connection::{Connection, RequestConnection};
use x11rb::errors::ParseError;
use x11rb::protocol::record::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    KeyPressEvent, Mapping, MappingNotifyEvent, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
    MAPPING_NOTIFY_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::x11_utils::TryParse;

use super::{CaptureError, CaptureEvent, CaptureSource, KeyEventKind, RawKeyEvent, StopHandle};
use crate::keyboard::X11Keyboard;

/// Record reply categories (RECORD protocol, EnableContext reply)
const FROM_SERVER: u8 = 0;
const START_OF_DATA: u8 = 4;
const END_OF_DATA: u8 = 5;

/// Size of a core event or error on the wire
const WIRE_EVENT_LEN: usize = 32;

/// Response type of a reply on the wire
const REPLY: u8 = 1;

/// Record context listening to every client's key events
pub struct RecordCapture {
    ctrl: Arc<RustConnection>,
    data: Option<RustConnection>,
    screen: usize,
    context: record::Context,
    stop: StopHandle,
    freed: bool,
}

impl RecordCapture {
    /// Connect to `display` (or `$DISPLAY`) and create the record context
    ///
    /// Fails with [`CaptureError::Unavailable`] when the server lacks the
    /// RECORD extension.
    pub fn connect(display: Option<&str>) -> Result<Self, CaptureError> {
        let (ctrl, screen) = x11rb::connect(display)?;
        let (data, _) = x11rb::connect(display)?;

        if ctrl
            .extension_information(record::X11_EXTENSION_NAME)?
            .is_none()
        {
            return Err(CaptureError::Unavailable(
                "the X server does not support the RECORD extension".to_string(),
            ));
        }
        let version = ctrl
            .record_query_version(
                record::X11_XML_VERSION.0 as u16,
                record::X11_XML_VERSION.1 as u16,
            )?
            .reply()?;
        debug!(
            major = version.major_version,
            minor = version.minor_version,
            "RECORD extension available"
        );

        let context = ctrl.generate_id()?;
        ctrl.record_create_context(
            context,
            0,
            &[record::CS::ALL_CLIENTS.into()],
            &[key_event_range()],
        )?
        .check()?;

        let ctrl = Arc::new(ctrl);
        let stop = {
            let ctrl = Arc::clone(&ctrl);
            StopHandle::new(move || disable_context(&ctrl, context))
        };

        info!(screen, context, "record context created");

        Ok(Self {
            ctrl,
            data: Some(data),
            screen,
            context,
            stop,
            freed: false,
        })
    }
}

/// Key presses and releases from the devices, plus delivered
/// MappingNotify so layout changes are noticed
fn key_event_range() -> record::Range {
    let empty = record::Range8 { first: 0, last: 0 };
    let empty_ext = record::ExtRange {
        major: empty,
        minor: record::Range16 { first: 0, last: 0 },
    };
    record::Range {
        core_requests: empty,
        core_replies: empty,
        ext_requests: empty_ext,
        ext_replies: empty_ext,
        delivered_events: record::Range8 {
            first: MAPPING_NOTIFY_EVENT,
            last: MAPPING_NOTIFY_EVENT,
        },
        device_events: record::Range8 {
            first: KEY_PRESS_EVENT,
            last: KEY_RELEASE_EVENT,
        },
        errors: empty,
        client_started: false,
        client_died: false,
    }
}

fn disable_context(conn: &RustConnection, context: record::Context) {
    match conn
        .record_disable_context(context)
        .and_then(|_| conn.flush())
    {
        Ok(()) => info!(context, "record context disabled"),
        Err(e) => warn!(%e, context, "failed to disable record context"),
    }
}

impl CaptureSource for RecordCapture {
    type Keyboard = X11Keyboard;

    fn keyboard(&self) -> X11Keyboard {
        X11Keyboard::new(Arc::clone(&self.ctrl), self.screen)
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn run(&mut self, handler: &mut dyn FnMut(CaptureEvent)) -> Result<(), CaptureError> {
        if self.stop.is_stopped() {
            debug!("capture stopped before it started");
            return Ok(());
        }
        let data = self.data.as_ref().ok_or_else(|| {
            CaptureError::Unavailable("record connection already closed".to_string())
        })?;

        for reply in data.record_enable_context(self.context)? {
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) if self.stop.is_stopped() => {
                    debug!(%e, "record stream ended during teardown");
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            match reply.category {
                START_OF_DATA => info!("recording key events"),
                FROM_SERVER => {
                    if reply.client_swapped {
                        warn!("skipping byte-swapped record data");
                        continue;
                    }
                    match parse_record_data(&reply.data) {
                        Ok(events) => events.into_iter().for_each(&mut *handler),
                        Err(e) => warn!(%e, len = reply.data.len(), "dropping record data"),
                    }
                }
                END_OF_DATA => {
                    debug!("record stream finished");
                    break;
                }
                category => trace!(category, "ignoring record reply"),
            }
        }

        Ok(())
    }

    fn cleanup(&mut self) {
        if self.freed {
            return;
        }
        self.freed = true;
        self.stop.stop();

        match self
            .ctrl
            .record_free_context(self.context)
            .and_then(|_| self.ctrl.flush())
        {
            Ok(()) => debug!(context = self.context, "record context freed"),
            Err(e) => warn!(%e, "failed to free record context"),
        }
        self.data = None;
        info!("capture connections released");
    }
}

impl Drop for RecordCapture {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Decode the protocol data of a FromServer record reply
///
/// The payload is a sequence of wire events, errors and replies. Key
/// events and keyboard MappingNotify are returned, everything else is
/// skipped by its wire length.
pub fn parse_record_data(data: &[u8]) -> Result<Vec<CaptureEvent>, ParseError> {
    let mut events = Vec::new();
    let mut remaining = data;

    while let Some(&response_type) = remaining.first() {
        let len = match response_type & 0x7F {
            code @ (KEY_PRESS_EVENT | KEY_RELEASE_EVENT) => {
                let (event, rest) = KeyPressEvent::try_parse(remaining)?;
                let kind = if code == KEY_PRESS_EVENT {
                    KeyEventKind::Press
                } else {
                    KeyEventKind::Release
                };
                events.push(CaptureEvent::Key(RawKeyEvent {
                    kind,
                    code: event.detail,
                    state: u16::from(event.state),
                }));
                remaining = rest;
                continue;
            }
            MAPPING_NOTIFY_EVENT => {
                let (event, rest) = MappingNotifyEvent::try_parse(remaining)?;
                if event.request == Mapping::KEYBOARD {
                    events.push(CaptureEvent::LayoutChanged);
                }
                remaining = rest;
                continue;
            }
            REPLY => reply_len(remaining)?,
            // Errors and all other events are fixed size
            _ => WIRE_EVENT_LEN,
        };
        remaining = remaining.get(len..).ok_or(ParseError::InsufficientData)?;
    }

    Ok(events)
}

/// Wire length of a reply: 32 bytes plus its extra length in 4-byte units
fn reply_len(data: &[u8]) -> Result<usize, ParseError> {
    let (extra, _) = u32::try_parse(data.get(4..).ok_or(ParseError::InsufficientData)?)?;
    usize::try_from(extra)
        .ok()
        .and_then(|extra| extra.checked_mul(4))
        .and_then(|extra| extra.checked_add(WIRE_EVENT_LEN))
        .ok_or(ParseError::ConversionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::KeyButMask;

    fn key_event(response_type: u8, detail: u8, state: u16) -> [u8; 32] {
        let event = KeyPressEvent {
            response_type,
            detail,
            sequence: 7,
            time: 1234,
            root: 0x100,
            event: 0x100,
            child: 0,
            root_x: 10,
            root_y: 20,
            event_x: 10,
            event_y: 20,
            state: KeyButMask::from(state),
            same_screen: true,
        };
        event.into()
    }

    fn mapping_notify(request: Mapping) -> [u8; 32] {
        MappingNotifyEvent {
            response_type: MAPPING_NOTIFY_EVENT,
            sequence: 3,
            request,
            first_keycode: 8,
            count: 248,
        }
        .into()
    }

    #[test]
    fn test_parse_press_and_release() {
        let mut data = Vec::new();
        data.extend_from_slice(&key_event(KEY_PRESS_EVENT, 38, 1));
        data.extend_from_slice(&key_event(KEY_RELEASE_EVENT, 38, 1));

        let events = parse_record_data(&data).unwrap();
        assert_eq!(
            events,
            vec![
                CaptureEvent::Key(RawKeyEvent {
                    kind: KeyEventKind::Press,
                    code: 38,
                    state: 1,
                }),
                CaptureEvent::Key(RawKeyEvent {
                    kind: KeyEventKind::Release,
                    code: 38,
                    state: 1,
                }),
            ]
        );
    }

    #[test]
    fn test_parse_keyboard_mapping_notify() {
        let mut data = Vec::new();
        data.extend_from_slice(&mapping_notify(Mapping::POINTER));
        data.extend_from_slice(&mapping_notify(Mapping::KEYBOARD));
        let events = parse_record_data(&data).unwrap();
        assert_eq!(events, vec![CaptureEvent::LayoutChanged]);
    }

    #[test]
    fn test_parse_skips_other_records() {
        let mut data = Vec::new();
        // Error
        data.extend_from_slice(&[0u8; 32]);
        // Reply with 2 extra words
        let mut reply = vec![0u8; 40];
        reply[0] = REPLY;
        reply[4..8].copy_from_slice(&2u32.to_ne_bytes());
        data.extend_from_slice(&reply);
        // Unrelated event (FocusIn)
        let mut focus = [0u8; 32];
        focus[0] = 9;
        data.extend_from_slice(&focus);
        data.extend_from_slice(&key_event(KEY_PRESS_EVENT, 40, 0));

        let events = parse_record_data(&data).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            CaptureEvent::Key(RawKeyEvent { code: 40, .. })
        ));
    }

    #[test]
    fn test_parse_empty_and_truncated() {
        assert!(parse_record_data(&[]).unwrap().is_empty());
        let event = key_event(KEY_PRESS_EVENT, 40, 0);
        assert!(parse_record_data(&event[..16]).is_err());
        let mut focus = [0u8; 20];
        focus[0] = 9;
        assert!(parse_record_data(&focus).is_err());
    }

    #[test]
    fn test_key_event_range_covers_keys_and_mapping() {
        let range = key_event_range();
        assert_eq!(range.device_events.first, KEY_PRESS_EVENT);
        assert_eq!(range.device_events.last, KEY_RELEASE_EVENT);
        assert_eq!(range.delivered_events.first, MAPPING_NOTIFY_EVENT);
        assert!(!range.client_started);
    }
}
