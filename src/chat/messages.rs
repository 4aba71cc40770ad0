//! Button labels, keyboards and reply templates
//!
//! Every user-facing string lives here so the state machine only decides
//! *which* reply to send.

use super::traits::Keyboard;

/// Entry command
pub const CMD_START: &str = "/start";

// Keyboard button labels
pub const BTN_START: &str = "Start";
pub const BTN_PWD_STRONGER: &str = "Create stronger";
pub const BTN_PWD_LEAVEWEAK: &str = "Leave weak";
pub const BTN_PWD_TRYAGAIN: &str = "Try again";
pub const BTN_PWD_STARTOVER: &str = "Start over";
pub const BTN_PWD_NEW: &str = "Create new password";
pub const BTN_RECORD: &str = "Add record";
pub const BTN_BROWSE: &str = "Browse";
pub const BTN_LOGOUT: &str = "Log out";
pub const BTN_RECORD_SAVE: &str = "Save";
pub const BTN_RECORD_CANCEL: &str = "Cancel";
pub const BTN_PAGE_PREV: &str = "Previous";
pub const BTN_PAGE_NEXT: &str = "Next";
pub const BTN_BACK: &str = "Back";

/// Phrase the user must type to wipe the account
pub fn wipe_confirmation_phrase(record_count: u64) -> String {
    format!("Consciously I remove all {} records", record_count)
}

// ============================================================================
// Keyboards
// ============================================================================

pub fn kb_main_menu() -> Keyboard {
    Keyboard::buttons(&[&[BTN_RECORD, BTN_BROWSE], &[BTN_LOGOUT]])
}

pub fn kb_start() -> Keyboard {
    Keyboard::buttons(&[&[BTN_START]])
}

pub fn kb_weak_password() -> Keyboard {
    Keyboard::buttons(&[&[BTN_PWD_STRONGER, BTN_PWD_LEAVEWEAK]])
}

pub fn kb_setup_mismatch() -> Keyboard {
    Keyboard::buttons(&[&[BTN_PWD_TRYAGAIN, BTN_PWD_STARTOVER]])
}

pub fn kb_verify_failed() -> Keyboard {
    Keyboard::buttons(&[&[BTN_PWD_TRYAGAIN], &[BTN_PWD_NEW]])
}

pub fn kb_confirm_record() -> Keyboard {
    Keyboard::buttons(&[&[BTN_RECORD_SAVE, BTN_RECORD_CANCEL]])
}

pub fn kb_browse(has_prev: bool, has_next: bool) -> Keyboard {
    let mut nav: Vec<String> = Vec::new();
    if has_prev {
        nav.push(BTN_PAGE_PREV.to_string());
    }
    if has_next {
        nav.push(BTN_PAGE_NEXT.to_string());
    }

    let mut rows = Vec::new();
    if !nav.is_empty() {
        rows.push(nav);
    }
    rows.push(vec![BTN_BACK.to_string()]);
    Keyboard::Buttons(rows)
}

// ============================================================================
// Reply templates
// ============================================================================

pub fn msg_welcome_new() -> &'static str {
    "Hi! My name is Charles. You can trust me all your secrets and nobody will ever know \
     about them except you. Please send me the password to start.\n\n\
     Notice, there is no way to recover data if the password is lost! \
     So, please, remember it carefully!!!"
}

pub fn msg_welcome_back() -> &'static str {
    "Hi again! My name is Charles. Please send me your password to unlock your records."
}

pub fn msg_already_authorized() -> &'static str {
    "You are already authorized. Use the menu buttons to securely store your data."
}

pub fn msg_press_start() -> &'static str {
    "Press Start (or send /start) to begin."
}

pub fn msg_weak_password() -> &'static str {
    "The password you entered is weak and does not provide enough security!\n\
     It is highly recommended to come up with a reliable password, which satisfies:\n\
     - At least 8 symbols\n\
     - Consists of a-z, A-Z, 0-9 and/or special symbols @#$%^&+=\n\n\
     Do you want to change your opinion and create a stronger password?"
}

pub fn msg_repeat_password() -> &'static str {
    "Please send me the password again (and remember it properly!)."
}

pub fn msg_password_mismatch() -> &'static str {
    "Ooopsie! The passwords do not match! Please try again or create a new password."
}

pub fn msg_password_created() -> &'static str {
    "Password successfully created! You can now begin securely storing your data."
}

pub fn msg_authorized() -> &'static str {
    "Password accepted. Welcome back!"
}

pub fn msg_wrong_password() -> &'static str {
    "Wrong password! Try again, or create a new password (this removes all your records)."
}

pub fn msg_send_strong_password() -> &'static str {
    "Very nice decision! Please send me a strong password now.\n\
     Notice, there is no way to recover data if the password is lost! \
     So, please, remember it carefully!!!"
}

pub fn msg_keep_weak_password() -> &'static str {
    "I'm only offering and it is your responsibility for this decision.\n\
     Please repeat the password again, so I can check that you remembered it properly."
}

pub fn msg_send_password() -> &'static str {
    "Please send me your password."
}

pub fn msg_start_over() -> &'static str {
    "That's a good idea. Create a new strong password, remember it and send it to me."
}

/// Ask for the content-derived wipe phrase
pub fn msg_wipe_request(record_count: u64) -> String {
    format!(
        "Creating a new password destroys your account and all {} stored records. \
         This cannot be undone.\n\n\
         If you really want this, send me exactly:\n\n{}",
        record_count,
        wipe_confirmation_phrase(record_count)
    )
}

pub fn msg_wipe_done(accounts: u64, records: u64) -> String {
    format!(
        "Done. Removed {} account(s) and {} record(s). Press Start to set up a new password.",
        accounts, records
    )
}

pub fn msg_main_menu() -> &'static str {
    "What would you like to do?"
}

pub fn msg_type_record() -> &'static str {
    "Send me the secret you want to store. I'll encrypt it and remove your message."
}

pub fn msg_confirm_record(size: usize) -> String {
    format!(
        "Encrypted your record ({} bytes). Save it?",
        size
    )
}

pub fn msg_record_saved() -> &'static str {
    "Record saved."
}

pub fn msg_record_discarded() -> &'static str {
    "Record discarded."
}

pub fn msg_choose_save_or_cancel() -> &'static str {
    "Please choose Save or Cancel."
}

pub fn msg_no_records() -> &'static str {
    "You have no records yet."
}

pub fn msg_record_not_found(number: usize) -> String {
    format!("There is no record number {}.", number)
}

pub fn msg_record_view(number: usize, timestamp: &str, content: &str) -> String {
    format!("#{} ({})\n\n{}", number, timestamp, content)
}

pub fn msg_logged_out() -> &'static str {
    "You have been logged out. Send me your password to log in again."
}

pub fn msg_session_expired() -> &'static str {
    "You have been logged out due to inactivity. Send me your password to continue."
}

pub fn msg_generic_error() -> &'static str {
    "Something went wrong on my side. Please try again in a moment."
}

/// One page of the record overview
///
/// `entries` are `(number, timestamp, size)` tuples already sliced to the page.
pub fn msg_browse_page(entries: &[(usize, String, u64)], page: usize, page_count: usize) -> String {
    let mut msg = format!("Your records (page {}/{}):\n\n", page + 1, page_count);
    for (number, timestamp, size) in entries {
        msg.push_str(&format!("{}. {} - {} bytes\n", number, timestamp, size));
    }
    msg.push_str("\nSend a record number to view it.");
    msg
}
