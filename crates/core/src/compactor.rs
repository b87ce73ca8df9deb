//! Screenshot compaction for resend-everything providers.

use deskpilot_providers::{ContentBlock, ConversationMessage};
use tracing::debug;

pub const STRIPPED_IMAGE_PLACEHOLDER: &str = "[earlier screenshot removed]";

/// Keeps only the newest image anywhere in the history.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversationCompactor;

impl ConversationCompactor {
    pub fn new() -> Self {
        Self
    }

    /// Strip every image except the most recent one, in place.
    ///
    /// Tool results left empty get a placeholder text block. Text is never
    /// touched. Returns the number of images removed.
    pub fn compact(&self, messages: &mut [ConversationMessage]) -> usize {
        let mut kept = false;
        let mut removed = 0;

        for message in messages.iter_mut().rev() {
            strip_blocks(&mut message.content, &mut kept, &mut removed);
        }

        if removed > 0 {
            debug!("Compaction removed {} stale screenshots", removed);
            crate::metrics::increment_compaction_count(removed);
        }
        removed
    }
}

/// Walks newest-to-oldest within one block list.
fn strip_blocks(blocks: &mut Vec<ContentBlock>, kept: &mut bool, removed: &mut usize) {
    let mut index = blocks.len();
    while index > 0 {
        index -= 1;
        if blocks[index].is_image() {
            if *kept {
                blocks.remove(index);
                *removed += 1;
            } else {
                *kept = true;
            }
            continue;
        }
        if let ContentBlock::ToolResult { content, .. } = &mut blocks[index] {
            let before = content.len();
            strip_blocks(content, kept, removed);
            if content.is_empty() && before > 0 {
                content.push(ContentBlock::text(STRIPPED_IMAGE_PLACEHOLDER));
            }
        }
    }
}
