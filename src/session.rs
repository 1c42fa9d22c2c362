//! Editing session state.
//!
//! One session owns the HTML source of truth for a single document plus
//! the chat history alongside it. File import runs the converter and the
//! structural repair pipeline before the content replaces the editor;
//! chat replies only touch the document when a fully parsed update comes
//! back. All mutation is serial; a failed operation leaves the previous
//! content in place.

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::chat::{
    parse_assistant_reply, AssistantReply, ChatConfig, ChatMessage, ChatRequest, ChatTransport,
    TransportError,
};
use crate::doc::{Change, Document};
use crate::docx::{docx_to_html, html_to_docx, DocxError};
use crate::repair::repair_html;

const EMPTY_DOCUMENT: &str = "<p></p>";
const PLACEHOLDER: &str = "<p>Start typing or load a document...</p>";
const UNTITLED: &str = "Untitled Document";
const GREETING: &str = "Hello! I can help you edit your document. Just tell me what changes \
                        you'd like to make, and I'll show you the redlined version before \
                        applying them.";
const UPDATE_NOTE: &str = "Document updated.";

/// Failures surfaced by session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The document could not be read; nothing was loaded.
    #[error("could not load document: {0}")]
    Import(DocxError),

    /// The document could not be serialized; the content is untouched.
    #[error("could not export document: {0}")]
    Export(DocxError),

    /// The chat round trip failed; the document is untouched.
    #[error("chat request failed: {0}")]
    Chat(TransportError),
}

/// A single document plus its conversation.
#[derive(Debug)]
pub struct EditorSession {
    html: String,
    file_name: String,
    unsaved_changes: bool,
    messages: Vec<ChatMessage>,
    pub config: ChatConfig,
}

impl EditorSession {
    pub fn new() -> EditorSession {
        EditorSession {
            html: PLACEHOLDER.to_string(),
            file_name: UNTITLED.to_string(),
            unsaved_changes: false,
            messages: vec![ChatMessage::assistant(GREETING)],
            config: ChatConfig::default(),
        }
    }

    /// Current document HTML, the source of truth for every consumer.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Word count of the current text, for the status bar.
    pub fn word_count(&self) -> usize {
        self.current_text().unicode_words().count()
    }

    /// Character count of the current text, newline separators included.
    pub fn char_count(&self) -> usize {
        self.current_text().chars().count()
    }

    fn current_text(&self) -> String {
        Document::from_html(&self.html).flattened_text()
    }

    /// Discard the current content and start an empty document.
    pub fn new_document(&mut self) {
        self.html = EMPTY_DOCUMENT.to_string();
        self.file_name = UNTITLED.to_string();
        self.unsaved_changes = false;
    }

    /// Replace the content from the editing surface.
    pub fn set_content(&mut self, html: impl Into<String>) {
        self.html = html.into();
        self.unsaved_changes = true;
    }

    /// Import a .docx file: convert, repair, and replace the content.
    /// On failure the previous content stays loaded.
    pub fn load_docx(&mut self, file_data: &[u8], file_name: &str) -> Result<(), SessionError> {
        let converted = docx_to_html(file_data).map_err(SessionError::Import)?;
        for warning in &converted.warnings {
            log::warn!("import: {}", warning);
        }
        log::debug!(
            "imported {}: {} paragraphs, {} words",
            file_name,
            converted.paragraph_count,
            converted.word_count
        );

        self.html = repair_html(&converted.html);
        self.file_name = file_name
            .strip_suffix(".docx")
            .unwrap_or(file_name)
            .to_string();
        self.unsaved_changes = false;
        Ok(())
    }

    /// Serialize the current content to .docx bytes. Clears the unsaved
    /// flag only once serialization succeeded.
    pub fn export_docx(&mut self, title: Option<&str>) -> Result<Vec<u8>, SessionError> {
        let file_data = html_to_docx(&self.html, title).map_err(SessionError::Export)?;
        self.unsaved_changes = false;
        Ok(file_data)
    }

    /// Overlay a batch of redline changes on the content.
    pub fn apply_changes(&mut self, changes: &[Change]) {
        let marked = Document::from_html(&self.html).apply_changes(changes);
        self.set_content(marked.to_html());
    }

    /// Resolve all redline marks in favor of the proposed changes.
    pub fn accept_all_changes(&mut self) {
        let resolved = Document::from_html(&self.html).accept_all();
        self.set_content(resolved.to_html());
    }

    /// Resolve all redline marks in favor of the original text.
    pub fn reject_all_changes(&mut self) {
        let resolved = Document::from_html(&self.html).reject_all();
        self.set_content(resolved.to_html());
    }

    /// Send a user message through the transport and fold the reply into
    /// the session: the conversation grows either way, and the document
    /// is replaced only when the reply carried a fully parsed update.
    pub fn send_message(
        &mut self,
        transport: &dyn ChatTransport,
        text: impl Into<String>,
    ) -> Result<AssistantReply, SessionError> {
        self.messages.push(ChatMessage::user(text));
        let request = ChatRequest {
            messages: self.messages.clone(),
            document_content: self.html.clone(),
        };

        let response = match transport.send(&request) {
            Ok(response) => response,
            Err(err) => {
                self.messages.push(ChatMessage::assistant(err.user_hint()));
                return Err(SessionError::Chat(err));
            }
        };

        let reply = parse_assistant_reply(&response.message);
        if let Some(html) = &reply.html {
            log::debug!("applying chat update: {} chars", html.len());
            self.set_content(html.clone());
        }
        let note = if reply.explanation.is_empty() {
            if reply.html.is_some() {
                UPDATE_NOTE.to_string()
            } else {
                response.message
            }
        } else {
            reply.explanation.clone()
        };
        self.messages.push(ChatMessage::assistant(note));
        Ok(reply)
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        EditorSession::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatResponse, ChatRole};
    use std::cell::RefCell;

    struct CannedTransport {
        reply: &'static str,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl CannedTransport {
        fn new(reply: &'static str) -> CannedTransport {
            CannedTransport {
                reply,
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatTransport for CannedTransport {
        fn send(&self, request: &ChatRequest) -> Result<ChatResponse, TransportError> {
            self.requests.borrow_mut().push(request.clone());
            Ok(ChatResponse {
                message: self.reply.to_string(),
            })
        }
    }

    struct TimingOutTransport;

    impl ChatTransport for TimingOutTransport {
        fn send(&self, _request: &ChatRequest) -> Result<ChatResponse, TransportError> {
            Err(TransportError::Timeout)
        }
    }

    #[test]
    fn test_new_session_seeds_placeholder_and_greeting() {
        let session = EditorSession::new();
        assert_eq!(session.html(), "<p>Start typing or load a document...</p>");
        assert_eq!(session.file_name(), "Untitled Document");
        assert!(!session.has_unsaved_changes());
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, ChatRole::Assistant);
        assert!(session.messages()[0].content.starts_with("Hello!"));
    }

    #[test]
    fn test_load_docx_converts_and_strips_extension() {
        let _ = env_logger::builder().is_test(true).try_init();
        let file_data = html_to_docx("<p>Loaded text.</p>", None).unwrap();
        let mut session = EditorSession::new();
        session.set_content("<p>old</p>");

        session.load_docx(&file_data, "Contract.docx").unwrap();
        assert_eq!(session.file_name(), "Contract");
        assert!(!session.has_unsaved_changes());
        assert!(session.html().contains("Loaded text."), "{}", session.html());
    }

    #[test]
    fn test_load_failure_keeps_previous_content() {
        let mut session = EditorSession::new();
        session.set_content("<p>safe</p>");

        let err = session.load_docx(b"not a zip archive", "Broken.docx");
        assert!(matches!(err, Err(SessionError::Import(_))));
        assert_eq!(session.html(), "<p>safe</p>");
        assert_eq!(session.file_name(), "Untitled Document");
    }

    #[test]
    fn test_send_message_applies_update_and_keeps_prose() {
        let transport = CannedTransport::new(
            "Shortened it.\n```json\n{\"updatedHtml\": \"<p>new body</p>\"}\n```",
        );
        let mut session = EditorSession::new();

        let reply = session.send_message(&transport, "Make it shorter").unwrap();
        assert_eq!(reply.html.as_deref(), Some("<p>new body</p>"));
        assert_eq!(session.html(), "<p>new body</p>");
        assert!(session.has_unsaved_changes());

        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[2].content, "Shortened it.");

        let requests = transport.requests.borrow();
        assert_eq!(requests[0].document_content, PLACEHOLDER);
        assert_eq!(requests[0].messages.len(), 2);
    }

    #[test]
    fn test_plain_reply_leaves_document_alone() {
        let transport = CannedTransport::new("The second clause already covers that.");
        let mut session = EditorSession::new();

        let reply = session.send_message(&transport, "Is clause two needed?").unwrap();
        assert_eq!(reply.html, None);
        assert_eq!(session.html(), PLACEHOLDER);
        assert!(!session.has_unsaved_changes());
        assert_eq!(
            session.messages().last().map(|m| m.content.as_str()),
            Some("The second clause already covers that.")
        );
    }

    #[test]
    fn test_transport_failure_surfaces_hint_as_message() {
        let mut session = EditorSession::new();

        let err = session.send_message(&TimingOutTransport, "Rewrite everything");
        assert!(matches!(err, Err(SessionError::Chat(TransportError::Timeout))));
        assert_eq!(session.html(), PLACEHOLDER);
        let last = session.messages().last().map(|m| m.content.as_str());
        assert_eq!(
            last,
            Some(
                "The request took too long. Try asking a simpler question or working with a \
                 smaller document section."
            )
        );
    }

    #[test]
    fn test_redline_cycle_through_session() {
        let mut session = EditorSession::new();
        session.set_content("<p>alpha beta</p>");

        session.apply_changes(&[Change {
            kind: crate::doc::ChangeKind::Deletion,
            text: String::new(),
            position: Some(0),
            old_text: Some("alpha ".to_string()),
        }]);
        assert!(session.html().contains("redline-deletion"));

        session.accept_all_changes();
        assert_eq!(session.html(), "<p>beta</p>");
    }

    #[test]
    fn test_counts_follow_the_content() {
        let mut session = EditorSession::new();
        session.set_content("<p>alpha beta</p><p>gamma</p>");

        assert_eq!(session.word_count(), 3);
        assert_eq!(session.char_count(), "alpha beta\ngamma".chars().count());
    }

    #[test]
    fn test_new_document_resets_state() {
        let mut session = EditorSession::new();
        session.set_content("<p>draft</p>");

        session.new_document();
        assert_eq!(session.html(), "<p></p>");
        assert_eq!(session.file_name(), "Untitled Document");
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_export_clears_unsaved_flag() {
        let mut session = EditorSession::new();
        session.set_content("<p>finished</p>");
        assert!(session.has_unsaved_changes());

        let file_data = session.export_docx(Some("Finished")).unwrap();
        assert!(file_data.starts_with(b"PK"));
        assert!(!session.has_unsaved_changes());
    }
}
