//! OTP code generation.

use rand::Rng;

/// Produces numeric codes of a requested length.
pub trait CodeGenerator: Send + Sync {
    /// Generates a code of exactly `length` ASCII digits.
    fn generate(&self, length: usize) -> String;
}

/// Generator backed by the thread-local CSPRNG, which `rand` seeds from the OS.
///
/// Codes are uniform over `[10^(L-1), 10^L - 1]`, so a code never starts with
/// a zero and always has the full length.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self, length: usize) -> String {
        if length == 0 {
            return String::new();
        }
        let mut rng = rand::thread_rng();
        // Within u64 a single draw keeps the distribution exactly uniform.
        if length <= 19 {
            let low = 10u64.pow(length as u32 - 1);
            let high = 10u64.pow(length as u32) - 1;
            let value = rng.gen_range(low..=high);
            return format!("{value:0length$}");
        }
        let mut code = String::with_capacity(length);
        code.push(char::from(b'0' + rng.gen_range(1..=9u8)));
        for _ in 1..length {
            code.push(char::from(b'0' + rng.gen_range(0..=9u8)));
        }
        code
    }
}

/// Returns true when `code` is exactly `length` ASCII digits.
pub fn is_well_formed_code(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_digit())
}

/// Splits a six-digit code into two groups for readability in messages.
///
/// Other lengths are returned unchanged.
pub fn format_code_for_message(code: &str) -> String {
    if code.len() == 6 && code.is_ascii() {
        format!("{} {}", &code[..3], &code[3..])
    } else {
        code.to_string()
    }
}
