use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dockwire_json::{
    decode_json, BuildInfo, CreateImageInfo, EventMessage, JsonConfig, ProgressRecord,
    PushImageInfo,
};
use dockwire_session::JsonSession;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cmd::{install_ctrlc_handler, open_input, ProgressArgs, ProgressKind};
use crate::exit::{session_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: ProgressArgs, format: OutputFormat) -> CliResult<i32> {
    let body = open_input(args.input.as_deref())?;
    let config = JsonConfig {
        max_unit_size: args.max_unit_size,
    };

    match args.kind {
        ProgressKind::Build => drain::<BuildInfo>(body, config, args.kind, format),
        ProgressKind::Pull => drain::<CreateImageInfo>(body, config, args.kind, format),
        ProgressKind::Push => drain::<PushImageInfo>(body, config, args.kind, format),
        ProgressKind::Events => drain::<EventMessage>(body, config, args.kind, format),
    }
}

fn drain<T>(
    body: Box<dyn Read + Send>,
    config: JsonConfig,
    kind: ProgressKind,
    format: OutputFormat,
) -> CliResult<i32>
where
    T: DeserializeOwned + ProgressRecord + Serialize + 'static,
{
    let mut session = JsonSession::<_, T>::json_with_decoder(body, config, decode_json::<T>);
    install_ctrlc_handler(session.cancel_handle())?;

    let label = kind.as_str();
    let records = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    {
        let records = Arc::clone(&records);
        let failures = Arc::clone(&failures);
        session.on_frame(move |record: &T| {
            records.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = record.error_message() {
                warn!(kind = label, error = message, "stream reported an in-band error");
                failures.fetch_add(1, Ordering::SeqCst);
            }
            print_record(label, record, format);
        });
    }

    session
        .wait()
        .map_err(|err| session_error(&format!("{label} stream failed"), err))?;

    let failures = failures.load(Ordering::SeqCst);
    debug!(
        kind = label,
        records = records.load(Ordering::SeqCst),
        failures,
        "progress stream finished"
    );

    if failures > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{label} stream reported {failures} error record(s)"),
        ));
    }
    Ok(SUCCESS)
}
