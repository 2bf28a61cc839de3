//! EXPUNGE command handler: permanently removes `\Deleted` messages from
//! the selected folder and sends one untagged `* N EXPUNGE` per removal.

use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_expunge<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    mailbox: &Mutex<Mailbox>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let _ = write_line(stream, &format!("{tag} BAD No folder selected\r\n")).await;
        return;
    };

    let folder_exists = { mailbox.lock().unwrap().get_folder(folder_name).is_some() };
    if !folder_exists {
        let _ = write_line(stream, &format!("{tag} BAD Folder not found\r\n")).await;
        return;
    }

    let expunged_seqs = {
        let mut mb = mailbox.lock().unwrap();
        let folder = mb.get_folder_mut(folder_name).unwrap();
        let deleted_indices: Vec<usize> =
            folder.emails.iter().enumerate().filter(|(_, e)| e.deleted).map(|(i, _)| i).collect();

        let mut seqs = Vec::new();
        for (offset, idx) in deleted_indices.iter().enumerate() {
            seqs.push(idx + 1 - offset);
        }
        for idx in deleted_indices.iter().rev() {
            folder.emails.remove(*idx);
        }
        seqs
    };

    for seq in &expunged_seqs {
        if write_line(stream, &format!("* {seq} EXPUNGE\r\n")).await.is_err() {
            return;
        }
    }

    let _ = write_line(stream, &format!("{tag} OK EXPUNGE completed\r\n")).await;
}
