//! UID STORE command handler. Modifies `\Seen`/`\Deleted` flags on
//! messages identified by UID and, unless `SILENT` was requested, echoes
//! back the new flag set per message.

use super::super::io::write_line;
use super::super::mailbox::Mailbox;
use imap_codec::imap_types::flag::{Flag, StoreResponse, StoreType};
use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};
use std::sync::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

fn extract_uids(seq_set: &SequenceSet, max_uid: u32) -> Vec<u32> {
    let mut uids = Vec::new();
    for seq in seq_set.0.as_ref() {
        match seq {
            Sequence::Single(SeqOrUid::Value(v)) => uids.push(v.get()),
            Sequence::Range(a, b) => {
                let lo = match a {
                    SeqOrUid::Value(v) => v.get(),
                    SeqOrUid::Asterisk => max_uid,
                };
                let hi = match b {
                    SeqOrUid::Value(v) => v.get(),
                    SeqOrUid::Asterisk => max_uid,
                };
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                uids.extend(lo..=hi);
            }
            Sequence::Single(_) => {}
        }
    }
    uids
}

pub struct StoreArgs<'a> {
    pub sequence_set: &'a SequenceSet,
    pub kind: &'a StoreType,
    pub response: &'a StoreResponse,
    pub flags: &'a [Flag<'a>],
}

pub async fn handle_uid_store<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    args: &StoreArgs<'_>,
    mailbox: &Mutex<Mailbox>,
    selected_folder: Option<&str>,
    stream: &mut BufReader<S>,
) {
    let Some(folder_name) = selected_folder else {
        let _ = write_line(stream, &format!("{tag} BAD No folder selected\r\n")).await;
        return;
    };

    let wants_seen = args.flags.iter().any(|f| matches!(f, Flag::Seen));
    let wants_deleted = args.flags.iter().any(|f| matches!(f, Flag::Deleted));

    let folder_exists = { mailbox.lock().unwrap().get_folder(folder_name).is_some() };
    if !folder_exists {
        let _ = write_line(stream, &format!("{tag} BAD Folder not found\r\n")).await;
        return;
    }

    let results = {
        let mut mb = mailbox.lock().unwrap();
        let folder = mb.get_folder_mut(folder_name).unwrap();
        let max_uid = folder.emails.iter().map(|e| e.uid).max().unwrap_or(0);
        let uids = extract_uids(args.sequence_set, max_uid);

        let mut results = Vec::new();
        for uid in uids {
            if let Some((idx, email)) = folder.emails.iter_mut().enumerate().find(|(_, e)| e.uid == uid) {
                match args.kind {
                    StoreType::Add => {
                        if wants_seen {
                            email.seen = true;
                        }
                        if wants_deleted {
                            email.deleted = true;
                        }
                    }
                    StoreType::Remove => {
                        if wants_seen {
                            email.seen = false;
                        }
                        if wants_deleted {
                            email.deleted = false;
                        }
                    }
                    StoreType::Replace => {
                        email.seen = wants_seen;
                        email.deleted = wants_deleted;
                    }
                }
                let mut current = Vec::new();
                if email.seen {
                    current.push("\\Seen".to_owned());
                }
                if email.deleted {
                    current.push("\\Deleted".to_owned());
                }
                results.push((idx + 1, uid, current));
            }
        }
        results
    };

    if !matches!(args.response, StoreResponse::Silent) {
        for (seq, uid, flags) in &results {
            let line = format!("* {seq} FETCH (UID {uid} FLAGS ({}))\r\n", flags.join(" "));
            if write_line(stream, &line).await.is_err() {
                return;
            }
        }
    }

    let _ = write_line(stream, &format!("{tag} OK STORE completed\r\n")).await;
}
