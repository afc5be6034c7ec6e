//! Terminal prompts. Owner thread only.

use std::io::{self, BufRead, Write};

/// Reads one trimmed line after printing `question`. `None` on end of input.
pub fn ask(question: &str) -> io::Result<Option<String>> {
    print!("{question}");
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Interprets a yes/no answer. `None` means the answer was not understood.
fn interpret(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        "" => Some(default),
        _ => None,
    }
}

/// Asks until the answer is yes, no or empty (which picks `default`).
pub fn yes_no(question: &str, default: bool) -> io::Result<bool> {
    loop {
        let Some(answer) = ask(question)? else {
            return Ok(default);
        };
        match interpret(&answer, default) {
            Some(choice) => return Ok(choice),
            None => println!("Invalid response '{answer}'. Please input a 'y' or 'n'."),
        }
    }
}

/// Asks until a non-empty answer is given. `None` on end of input.
pub fn required(question: &str) -> io::Result<Option<String>> {
    loop {
        match ask(question)? {
            Some(answer) if answer.is_empty() => {}
            other => return Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret() {
        assert_eq!(interpret("y", false), Some(true));
        assert_eq!(interpret(" YES ", false), Some(true));
        assert_eq!(interpret("n", true), Some(false));
        assert_eq!(interpret("", true), Some(true));
        assert_eq!(interpret("", false), Some(false));
        assert_eq!(interpret("maybe", false), None);
    }
}
