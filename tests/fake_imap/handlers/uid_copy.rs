//! UID COPY command handler: clones matching emails into a destination
//! folder, leaving the originals in place.

use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

fn extract_uids(seq_set: &SequenceSet) -> Vec<u32> {
    seq_set
        .0
        .as_ref()
        .iter()
        .filter_map(|seq| match seq {
            Sequence::Single(SeqOrUid::Value(v)) => Some(v.get()),
            _ => None,
        })
        .collect()
}

pub async fn handle_uid_copy<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    sequence_set: &SequenceSet,
    dest_folder: &str,
    mailbox: &Mutex<Mailbox>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let _ = write_line(stream, &format!("{tag} BAD No folder selected\r\n")).await;
        return;
    };

    let uids = extract_uids(sequence_set);
    let (src_exists, dest_exists) = {
        let mb = mailbox.lock().unwrap();
        (mb.get_folder(folder_name).is_some(), mb.get_folder(dest_folder).is_some())
    };
    if !src_exists {
        let _ = write_line(stream, &format!("{tag} BAD Source folder not found\r\n")).await;
        return;
    }
    if !dest_exists {
        let _ = write_line(stream, &format!("{tag} NO [TRYCREATE] Destination folder not found\r\n")).await;
        return;
    }

    {
        let mut mb = mailbox.lock().unwrap();
        let to_copy: Vec<_> =
            mb.get_folder(folder_name).unwrap().emails.iter().filter(|e| uids.contains(&e.uid)).cloned().collect();
        let dest = mb.get_folder_mut(dest_folder).unwrap();
        dest.emails.extend(to_copy);
    }

    let _ = write_line(stream, &format!("{tag} OK COPY completed\r\n")).await;
}
