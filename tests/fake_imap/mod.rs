//! Fake IMAP server used by the integration suite in `tests/fake_imap_test.rs`.

mod io;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
