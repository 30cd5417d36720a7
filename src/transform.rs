//! Folding flat join rows into nested film documents
//!
//! The film query joins credits and genres in one pass, so each film arrives
//! as a cross product of its persons and genres. The fold collapses that
//! fan-out into one document per film, deduplicating every list while
//! preserving first-seen order.

use crate::models::{FilmDocument, FilmRow, PersonRef, Role};
use std::collections::HashMap;
use uuid::Uuid;

/// Fold a stream of join rows into documents, one per distinct film id, in
/// the order films first appear in the input.
///
/// Credits append to their role list only when the person's name is new for
/// that list; genres append when unseen. Rows missing the person or genre
/// side of the join contribute nothing to the corresponding lists. Roles
/// outside actor/writer/director are ignored.
pub fn fold_rows<I>(rows: I) -> Vec<FilmDocument>
where
    I: IntoIterator<Item = FilmRow>,
{
    let mut by_id: HashMap<Uuid, usize> = HashMap::new();
    let mut documents: Vec<FilmDocument> = Vec::new();

    for row in rows {
        let slot = match by_id.get(&row.fw_id) {
            Some(&slot) => slot,
            None => {
                documents.push(FilmDocument::from_row_scalars(&row));
                by_id.insert(row.fw_id, documents.len() - 1);
                documents.len() - 1
            }
        };
        let doc = &mut documents[slot];

        if let (Some(role), Some(person_id), Some(name)) =
            (row.role.as_deref(), row.person_id, row.full_name.as_ref())
        {
            match Role::parse(role) {
                Some(Role::Actor) => {
                    if !doc.actors_names.contains(name) {
                        doc.actors_names.push(name.clone());
                        doc.actors.push(PersonRef {
                            id: person_id,
                            name: name.clone(),
                        });
                    }
                }
                Some(Role::Writer) => {
                    if !doc.writers_names.contains(name) {
                        doc.writers_names.push(name.clone());
                        doc.writers.push(PersonRef {
                            id: person_id,
                            name: name.clone(),
                        });
                    }
                }
                Some(Role::Director) => {
                    if !doc.director.contains(name) {
                        doc.director.push(name.clone());
                    }
                }
                None => {}
            }
        }

        // Genre handling is independent of the credit on the same row.
        if let Some(genre) = row.genre.as_ref() {
            if !doc.genre.contains(genre) {
                doc.genre.push(genre.clone());
            }
        }
    }

    documents
}
