//! Client reply loop: relays service output and exits on `terminate`.

use std::io::{ErrorKind, Read, Write};
use std::process::ExitCode;

use serde_json::Value;

use tether_protocol::{
    EMIT_STDERR, EMIT_STDOUT, Flow, Invocation, MessageBuffer, OperationError, Registry,
    RelayMessage, Signature, TERMINATE,
};

use crate::AppError;

const READ_CHUNK: usize = 128 * 1024;

type ClientRegistry = Registry<(), Value>;
type Call<'a> = Invocation<'a, (), Value>;

/// Registry of the operations the service may ask the client to run.
pub(crate) fn client_registry() -> Result<ClientRegistry, OperationError> {
    let mut registry = Registry::new();
    registry.register(EMIT_STDOUT, Signature::new(["text"]), |call: Call<'_>| {
        let text = text_argument(&call)?;
        emit(call.stdout, text)
    })?;
    registry.register(EMIT_STDERR, Signature::new(["text"]), |call: Call<'_>| {
        let text = text_argument(&call)?;
        emit(call.stderr, text)
    })?;
    registry.register(TERMINATE, Signature::new(["code"]), terminate)?;
    Ok(registry)
}

fn text_argument<'a>(call: &Call<'a>) -> Result<&'a str, OperationError> {
    call.argument(0)?
        .as_str()
        .ok_or_else(|| OperationError::invalid_argument(call.operation, "text must be a string"))
}

fn emit(stream: &mut dyn Write, text: &str) -> Result<Flow, OperationError> {
    stream.write_all(text.as_bytes())?;
    stream.flush()?;
    Ok(Flow::Continue)
}

fn terminate(call: Call<'_>) -> Result<Flow, OperationError> {
    let code = call
        .argument(0)?
        .as_i64()
        .and_then(|code| i32::try_from(code).ok())
        .ok_or_else(|| OperationError::invalid_argument(call.operation, "code must be an integer"))?;
    Ok(Flow::Terminate(code))
}

/// Converts a terminate code into the process exit status, wrapping like a
/// POSIX exit status does.
pub(crate) fn exit_status(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code.rem_euclid(256)).unwrap_or(u8::MAX))
}

/// Reads relay messages from `connection` until a terminate directive arrives.
///
/// Messages may arrive coalesced or split across reads. A chunk that does
/// not decode is reported on `stderr` and skipped; the loop keeps waiting.
pub(crate) fn relay_replies<R, W, E>(
    connection: &mut R,
    registry: &ClientRegistry,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<ExitCode, AppError>
where
    R: Read,
    W: Write,
    E: Write,
{
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0_u8; READ_CHUNK];
    loop {
        let read = match connection.read(&mut chunk) {
            Ok(0) => return Err(AppError::MissingExit),
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(AppError::ReadResponse(error)),
        };
        buffer.extend(chunk.get(..read).unwrap_or_default());

        loop {
            match buffer.next_message::<RelayMessage>() {
                Ok(Some(message)) => {
                    if let Flow::Terminate(code) = dispatch(registry, &message, stdout, stderr)? {
                        return Ok(exit_status(code));
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    writeln!(stderr, "{error}").map_err(AppError::ForwardOutput)?;
                    break;
                }
            }
        }
    }
}

fn dispatch<W: Write, E: Write>(
    registry: &ClientRegistry,
    message: &RelayMessage,
    stdout: &mut W,
    stderr: &mut E,
) -> Result<Flow, AppError> {
    registry
        .dispatch(Invocation {
            operation: &message.operation,
            state: &mut (),
            stdout,
            stderr,
            arguments: &message.arguments,
        })
        .map_err(|error| match error {
            OperationError::UnknownOperation { name, .. } => AppError::UnknownRelay { name },
            other => AppError::RelayFailed(other),
        })
}
