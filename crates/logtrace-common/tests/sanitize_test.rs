use logtrace_common::sanitize::{
    MAX_PROMPT_CHARS, ValidationError, sanitize, sanitize_bounded, validate_prompt,
};

// ============================================================================
// Prompt validation boundaries
// ============================================================================

#[test]
fn test_four_char_prompt_rejected() {
    assert_eq!(
        validate_prompt("abcd"),
        Err(ValidationError::TooShort { len: 4, min: 5 })
    );
}

#[test]
fn test_five_char_prompt_accepted() {
    assert_eq!(validate_prompt("abcde"), Ok(()));
}

#[test]
fn test_two_thousand_char_prompt_accepted() {
    let prompt = "a".repeat(MAX_PROMPT_CHARS);
    assert_eq!(validate_prompt(&prompt), Ok(()));
}

#[test]
fn test_two_thousand_one_char_prompt_rejected() {
    let prompt = "a".repeat(MAX_PROMPT_CHARS + 1);
    assert!(matches!(
        validate_prompt(&prompt),
        Err(ValidationError::TooLong { len: 2001, .. })
    ));
}

#[test]
fn test_empty_and_whitespace_prompt_rejected() {
    assert_eq!(validate_prompt(""), Err(ValidationError::Empty));
    assert_eq!(validate_prompt("   \n "), Err(ValidationError::Empty));
}

#[test]
fn test_length_counts_characters_not_bytes() {
    // five two-byte characters
    assert_eq!(validate_prompt("ééééé"), Ok(()));
}

#[test]
fn test_blocklisted_patterns_rejected() {
    for prompt in [
        "why does javascript:alert(1) run",
        "check <SCRIPT>tag</script>",
        "what does eval(x) do here",
        "read Document.Cookie please",
    ] {
        assert!(
            matches!(
                validate_prompt(prompt),
                Err(ValidationError::Suspicious { .. })
            ),
            "expected rejection for {prompt:?}"
        );
    }
}

// ============================================================================
// Sanitization
// ============================================================================

#[test]
fn test_sanitize_strips_angle_brackets() {
    assert_eq!(sanitize("<b>bold</b>"), "bbold/b");
}

#[test]
fn test_sanitize_strips_script_schemes_and_handlers() {
    let cleaned = sanitize("click JavaScript:doIt() onclick=run()");
    assert!(!cleaned.to_lowercase().contains("javascript:"));
    assert!(!cleaned.contains("onclick="));
}

#[test]
fn test_sanitize_trims() {
    assert_eq!(sanitize("   padded   "), "padded");
}

#[test]
fn test_sanitize_bounded_holds_after_sanitizing() {
    let raw = format!("{}{}", "<>".repeat(80), "x".repeat(150));
    let cleaned = sanitize_bounded(&raw, 100);
    assert_eq!(cleaned.chars().count(), 100);
    assert!(!cleaned.contains('<') && !cleaned.contains('>'));
}

#[test]
fn test_sanitize_keeps_words_starting_with_on() {
    assert_eq!(sanitize("set online = true"), "set online = true");
    assert_eq!(
        sanitize("the onboarding= flag and one =two"),
        "the onboarding= flag and one =two"
    );
}

#[test]
fn test_sanitize_strips_known_handlers_case_insensitively() {
    assert_eq!(sanitize("img OnError = steal()"), "img  steal()");
    assert_eq!(sanitize("a onmouseover=x b onLoad=y"), "a x b y");
}
