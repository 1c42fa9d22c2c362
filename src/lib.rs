pub mod chat;
pub mod doc;
pub mod docx;
pub mod html;
pub mod repair;
pub mod session;

pub use chat::{
    parse_assistant_reply, AssistantReply, ChatConfig, ChatMessage, ChatRequest, ChatResponse,
    ChatRole, ChatTransport, TransportError,
};
pub use doc::{Change, ChangeKind, Document};
pub use docx::{docx_to_html, html_to_docx, ConvertedDocument, DocxError};
pub use repair::repair_html;
pub use session::{EditorSession, SessionError};
