//! Render worker - runs in a dedicated thread and owns the open document

use flume::{Receiver, Sender};
use log::{debug, error, info};

use super::layout::{LayoutComposer, LayoutMode};
use super::request::{RenderFault, RenderRequest, RenderResponse, RequestId};
use super::source::{DocumentOpener, DocumentSource};

/// Main worker function.
///
/// Opens the document, reports its metadata, then serves slot requests until
/// shutdown or until the provider hangs up. The document is released when
/// this function returns.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    opener: Box<dyn DocumentOpener>,
    composer: LayoutComposer,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let name = opener.describe();
    let source = match opener.open() {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open {name}: {e}");
            let _ = responses.send(RenderResponse::OpenFailed(e));
            return;
        }
    };

    let page_count = source.page_count();
    info!("Render worker opened {name} ({page_count} pages)");
    let _ = responses.send(RenderResponse::DocumentInfo {
        page_count,
        title: source.title(),
    });

    for request in requests {
        match request {
            RenderRequest::Slot { id, slot, mode } => {
                let response = handle_slot_request(&*source, &composer, id, slot, &mode);
                if responses.send(response).is_err() {
                    break;
                }
            }
            RenderRequest::Shutdown => break,
        }
    }

    debug!("Render worker for {name} released the document");
}

fn handle_slot_request(
    source: &dyn DocumentSource,
    composer: &LayoutComposer,
    id: RequestId,
    slot: usize,
    mode: &LayoutMode,
) -> RenderResponse {
    match composer.composite(source, slot, mode) {
        Ok(Some(image)) => RenderResponse::Slot { id, slot, image },
        Ok(None) => RenderResponse::Error {
            id,
            slot,
            error: RenderFault::EmptySlot { slot },
        },
        Err(error) => {
            error!("Slot {slot} failed: {error}");
            RenderResponse::Error { id, slot, error }
        }
    }
}
