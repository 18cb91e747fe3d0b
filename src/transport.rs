//! Request/response exchange with the controller.

use log::{debug, warn};

use crate::{
    CommandFrame, Error,
    codec::Bits,
    response::{MAX_RESPONSE_SIZE, ResponseFrame},
};

/// A duplex byte stream to the controller.
///
/// Implementations own the timeout: `read_exact` must return once `buf` is
/// full or the timeout has elapsed, whichever comes first.
pub trait Channel {
    /// Writes every byte of `bytes`, in order.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the underlying stream fails.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error>;

    /// Fills `buf` from the stream, returning how many bytes arrived before
    /// the timeout. A value below `buf.len()` means the read timed out.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the underlying stream fails.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Drops whatever input is already waiting, returning how many bytes went.
    ///
    /// Called before the next command once an exchange has failed, so that a
    /// reply arriving after its timeout is not read as the next echo. Channels
    /// that cannot hold stale input keep the default.
    ///
    /// # Errors
    /// Returns `Error::Transport` if the underlying stream fails.
    fn discard_input(&mut self) -> Result<usize, Error> {
        Ok(0)
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        (**self).write_all(bytes)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        (**self).read_exact(buf)
    }

    fn discard_input(&mut self) -> Result<usize, Error> {
        (**self).discard_input()
    }
}

/// Sends `frame` and reads back its reply.
///
/// Frames the controller answers with an echo (SETUP, STEP, and HALT on
/// echoing firmware) are only accepted if the echo matches byte for byte.
///
/// `send` does not clean up after a failed exchange; late reply bytes stay
/// in the channel until [`Channel::discard_input`] is called. [`crate::Driver`]
/// does this before the command that follows a failure.
///
/// # Errors
/// - `Error::TransportTimeout` if fewer than `frame.response_size()` bytes arrive.
/// - `Error::EchoMismatch` if the echo differs from what was sent.
/// - `Error::Transport` if the channel itself fails.
pub fn send<C: Channel + ?Sized>(
    channel: &mut C,
    frame: &CommandFrame,
) -> Result<ResponseFrame, Error> {
    let sent = frame.bytes();
    debug!("TX {:?}: {}", frame.kind(), Bits(sent));
    channel.write_all(sent)?;

    let expected = frame.response_size();
    let mut buf = [0u8; MAX_RESPONSE_SIZE];
    let received = channel.read_exact(&mut buf[..expected])?;
    if received < expected {
        warn!(
            "{:?}: timed out after {received} of {expected} bytes: {}",
            frame.kind(),
            Bits(&buf[..received])
        );
        return Err(Error::TransportTimeout { expected, received });
    }

    let response = ResponseFrame::new(&buf[..expected])?;
    debug!("RX {:?}: {response}", frame.kind());

    if frame.expects_echo() && response.as_bytes() != sent.as_slice() {
        let mut echoed = [0u8; crate::FRAME_SIZE];
        echoed.copy_from_slice(response.as_bytes());
        warn!(
            "{:?}: echo mismatch, sent {} received {}",
            frame.kind(),
            Bits(sent),
            Bits(&echoed)
        );
        return Err(Error::EchoMismatch {
            sent: *sent,
            received: echoed,
        });
    }

    Ok(response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{ControlState, Revision};

    /// Replays a canned reply and records what was written.
    #[derive(Debug, Default)]
    struct Scripted {
        written: Vec<u8>,
        reply: Vec<u8>,
    }

    impl Channel for Scripted {
        fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
            self.written.extend_from_slice(bytes);
            Ok(())
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
            let n = buf.len().min(self.reply.len());
            buf[..n].copy_from_slice(&self.reply[..n]);
            self.reply.drain(..n);
            Ok(n)
        }
    }

    fn setup_frame() -> CommandFrame {
        let mut state = ControlState::for_motor(3.75);
        state.set_speed(10.0).unwrap();
        CommandFrame::setup(&state).unwrap()
    }

    #[test]
    fn test_echo_accepted() {
        let frame = setup_frame();
        let mut channel = Scripted {
            reply: frame.bytes().to_vec(),
            ..Default::default()
        };
        let response = send(&mut channel, &frame).unwrap();
        assert_eq!(response.as_bytes(), frame.bytes());
        assert_eq!(channel.written, frame.bytes());
    }

    #[test]
    fn test_echo_mismatch() {
        let frame = setup_frame();
        let mut reply = *frame.bytes();
        reply[2] ^= 0x01;
        let mut channel = Scripted {
            reply: reply.to_vec(),
            ..Default::default()
        };
        assert_eq!(
            send(&mut channel, &frame),
            Err(Error::EchoMismatch {
                sent: *frame.bytes(),
                received: reply,
            })
        );
    }

    #[test]
    fn test_partial_reply_times_out() {
        let frame = setup_frame();
        let mut channel = Scripted {
            reply: frame.bytes()[..2].to_vec(),
            ..Default::default()
        };
        assert_eq!(
            send(&mut channel, &frame),
            Err(Error::TransportTimeout {
                expected: 3,
                received: 2,
            })
        );
    }

    #[test]
    fn test_info_reply_is_not_compared() {
        let reply = [0x85, 0x1E, 0x84, 0x01, 0x00, 0x60];
        let mut channel = Scripted {
            reply: reply.to_vec(),
            ..Default::default()
        };
        let response = send(&mut channel, &CommandFrame::INFO).unwrap();
        assert_eq!(response.as_bytes(), reply);
    }

    #[test]
    fn test_halt_acknowledge() {
        let mut channel = Scripted {
            reply: vec![0x00],
            ..Default::default()
        };
        let response = send(&mut channel, &CommandFrame::halt(Revision::Acknowledge)).unwrap();
        assert_eq!(response.len(), 1);
        assert_eq!(channel.written, [0xC0, 0x00, 0x00]);
    }

    #[test]
    fn test_halt_echo_is_verified() {
        let mut channel = Scripted {
            reply: vec![0xC0, 0x00, 0x01],
            ..Default::default()
        };
        assert!(matches!(
            send(&mut channel, &CommandFrame::halt(Revision::Echoed)),
            Err(Error::EchoMismatch { .. })
        ));
    }

    #[test]
    fn test_send_through_reference() {
        let frame = setup_frame();
        let mut inner = Scripted {
            reply: frame.bytes().to_vec(),
            ..Default::default()
        };
        let mut channel = &mut inner;
        assert!(send(&mut channel, &frame).is_ok());
    }
}
