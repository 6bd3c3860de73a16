//! Amount-in-words for printed invoices (Indian numbering system).

const ONES: [&str; 20] = [
    "", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten", "Eleven",
    "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen", "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn two_digits(n: u64) -> String {
    debug_assert!(n < 100);
    if n < 20 {
        ONES[n as usize].to_string()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_string()
    } else {
        format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize])
    }
}

fn three_digits(n: u64) -> String {
    debug_assert!(n < 1000);
    if n < 100 {
        two_digits(n)
    } else if n % 100 == 0 {
        format!("{} Hundred", ONES[(n / 100) as usize])
    } else {
        format!("{} Hundred {}", ONES[(n / 100) as usize], two_digits(n % 100))
    }
}

fn number_words(n: u64) -> String {
    if n == 0 {
        return "Zero".to_string();
    }
    let mut parts = Vec::new();
    let crore = n / 1_00_00_000;
    let lakh = (n / 1_00_000) % 100;
    let thousand = (n / 1_000) % 100;
    let rest = n % 1_000;

    if crore > 0 {
        parts.push(format!("{} Crore", number_words(crore)));
    }
    if lakh > 0 {
        parts.push(format!("{} Lakh", two_digits(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", two_digits(thousand)));
    }
    if rest > 0 {
        parts.push(three_digits(rest));
    }
    parts.join(" ")
}

/// Render an (integral) grand total as words: `Rupees ... Only`.
pub fn amount_in_words(amount: f64) -> String {
    let rupees = amount.round().max(0.0) as u64;
    format!("Rupees {} Only", number_words(rupees))
}
