//! Collaborator traits (ports)

mod collaborators;

pub use collaborators::{
    ChatSender, DanmuServerInfo, SessionIdentity, SessionProvider, TokenProvider,
};
