use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dockwire_frame::{FrameConfig, StreamKind};
use dockwire_session::StdioSession;
use tracing::debug;

use crate::cmd::{install_ctrlc_handler, open_input, DemuxArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DemuxArgs, format: OutputFormat) -> CliResult<i32> {
    let body = open_input(args.input.as_deref())?;

    let mut config = FrameConfig::default();
    if let Some(max) = args.max_payload {
        config.max_payload_size = max;
    }

    let mut session = StdioSession::stdio_with_config(body, config);
    install_ctrlc_handler(session.cancel_handle())?;

    let printed = Arc::new(AtomicUsize::new(0));
    for kind in selected_streams(&args.streams) {
        let printed = Arc::clone(&printed);
        let handle = session.cancel_handle();
        let count = args.count;
        session.on_stream(kind, move |payload| {
            print_frame(kind, payload, format);
            let total = printed.fetch_add(1, Ordering::SeqCst) + 1;
            if count.is_some_and(|count| total >= count) {
                handle.cancel();
            }
        });
    }

    session
        .wait()
        .map_err(|err| session_error("demux failed", err))?;

    debug!(
        frames = printed.load(Ordering::SeqCst),
        state = ?session.state(),
        "demux finished"
    );
    Ok(SUCCESS)
}

/// Requested streams in first-mention order, without repeats.
fn selected_streams(requested: &[StreamKind]) -> Vec<StreamKind> {
    let mut streams = Vec::with_capacity(StreamKind::ALL.len());
    for kind in requested {
        if !streams.contains(kind) {
            streams.push(*kind);
        }
    }
    streams
}
