use crate::{
    character::CharacterSheet, record::RosterEntry, session::Identity, settings::Settings,
};

// Read-only view of the application state handed to components.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub identity: Option<&'a Identity>,
    pub sheet: Option<&'a CharacterSheet>,
    pub roster: &'a [RosterEntry],
    pub busy: bool,
    pub unsaved: bool,
}

impl Context<'_> {
    pub fn is_master(&self) -> bool {
        self.identity.is_some_and(Identity::is_master)
    }

    // True when the loaded sheet belongs to the signed-in user.
    pub fn owns_sheet(&self) -> bool {
        match (self.identity, self.sheet) {
            (Some(identity), Some(sheet)) => sheet.is_owned_by(identity.user_id()),
            _ => false,
        }
    }

    pub fn can_edit_sheet(&self) -> bool {
        self.sheet.is_some() && (self.owns_sheet() || self.is_master())
    }
}
