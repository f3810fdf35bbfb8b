//! Notification text templates.

use safeconnect_core::{Coordinates, Timestamp};

/// Line spoken between the two repetitions of a voice announcement.
pub const VOICE_REPEAT_LINE: &str = "I repeat.";

/// Emergency SMS sent when the user triggers SOS.
pub fn sos_sms(user_name: &str, location: Option<&Coordinates>) -> String {
    let mut message = format!(
        "EMERGENCY ALERT from SafeConnect!\n\n{} has triggered an SOS emergency alert.",
        user_name
    );
    if let Some(location) = location {
        message.push_str(&format!("\n\nCurrent Location:\n{}", location.maps_url()));
    }
    message.push_str(&format!(
        "\n\nPlease try to contact {} immediately or call emergency services if needed.",
        user_name
    ));
    message
}

pub fn sos_voice(user_name: &str, has_location: bool) -> Vec<String> {
    let mut announcement = format!(
        "This is an emergency alert from SafeConnect. {} has triggered an S O S alert.",
        user_name
    );
    if has_location {
        announcement.push_str(" A map link to their location has been sent to you by text message.");
    }
    announcement.push_str(&format!(
        " Please try to contact {} immediately, or call emergency services.",
        user_name
    ));
    repeated(announcement)
}

/// SMS sent when a journey passes its deadline without a check-in.
pub fn overdue_sms(
    user_name: &str,
    start_location: &str,
    destination: &str,
    last_location: Option<&Coordinates>,
) -> String {
    let mut message = format!(
        "ATTENTION: SafeConnect Alert\n\n{} has not arrived at their destination.\n\nRoute: {} to {}",
        user_name, start_location, destination
    );
    if let Some(location) = last_location {
        message.push_str(&format!("\n\nLast Known Location:\n{}", location.maps_url()));
    }
    message.push_str(&format!(
        "\n\nPlease try to contact {} to ensure they are safe.",
        user_name
    ));
    message
}

pub fn overdue_voice(user_name: &str, start_location: &str, destination: &str) -> Vec<String> {
    repeated(format!(
        "This is an alert from SafeConnect. {} has missed a safety check-in on their journey from {} to {}. Please try to contact {} to make sure they are safe.",
        user_name, start_location, destination, user_name
    ))
}

pub fn journey_start_sms(
    user_name: &str,
    start_location: &str,
    destination: &str,
    estimated_duration: i32,
    expected_arrival: Timestamp,
) -> String {
    format!(
        "SafeConnect Journey Alert\n\n{} has started a journey:\n\nFrom: {}\nTo: {}\n\nExpected Duration: {} minutes\nExpected Arrival: {}\n\nYou'll be notified if they don't arrive safely.",
        user_name,
        start_location,
        destination,
        estimated_duration,
        expected_arrival.format("%-I:%M %p UTC")
    )
}

pub fn journey_completed_sms(user_name: &str, destination: &str) -> String {
    format!(
        "SafeConnect Update\n\n{} has arrived safely at {}. No action needed.",
        user_name, destination
    )
}

pub fn verification_sms(code: &str, ttl_minutes: u64) -> String {
    format!(
        "Your SafeConnect verification code is: {}\n\nThis code expires in {} minutes.",
        code, ttl_minutes
    )
}

fn repeated(announcement: String) -> Vec<String> {
    vec![
        announcement.clone(),
        VOICE_REPEAT_LINE.to_string(),
        announcement,
    ]
}
