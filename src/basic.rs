//! Color BASIC / Extended Color BASIC detokenizer.
//!
//! # Background
//!
//! A BASIC program saved to disk is not text: keywords are replaced by
//! single bytes ≥ `0x80` (with `0xFF` escaping into a second table of
//! function names), and each line carries a link to the next.  The stored
//! layout:
//!
//! ```text
//! [FF xx xx xx xx]          optional 5-byte ML preamble
//! [next-line BE16] [line-number BE16] body... 00     (per line)
//! ```
//!
//! When the preamble is present the first line has no next-line link — it
//! starts straight at its line number.  A next-line link of `0x0000` ends
//! the program.
//!
//! Inside the body, `0x20..=0x7E` are literal characters, `"` toggles a
//! string-literal state that turns token interpretation off, and the `REM`
//! and `'` tokens swallow the rest of the line verbatim.
//!
//! # Scope
//!
//! Decoding only.  The function is pure — it knows nothing about disks or
//! volumes — and it never fails: malformed bytes degrade to placeholder
//! glyphs and truncated streams simply end.

/// Primary token table, indexed by `byte - 0x80`.
///
/// `0x80..=0xE0` is the contiguous Color/Extended/Disk BASIC set; the
/// sparse tail is Super Extended (CoCo 3) BASIC.  `0xFF` is the extended
/// escape, never a token itself.
static PRIMARY_TOKENS: [Option<&str>; 128] = [
    Some("FOR"),     // 0x80
    Some("GO"),      // 0x81
    Some("REM"),     // 0x82
    Some("'"),       // 0x83
    Some("ELSE"),    // 0x84
    Some("IF"),      // 0x85
    Some("DATA"),    // 0x86
    Some("PRINT"),   // 0x87
    Some("ON"),      // 0x88
    Some("INPUT"),   // 0x89
    Some("END"),     // 0x8A
    Some("NEXT"),    // 0x8B
    Some("DIM"),     // 0x8C
    Some("READ"),    // 0x8D
    Some("RUN"),     // 0x8E
    Some("RESTORE"), // 0x8F
    Some("RETURN"),  // 0x90
    Some("STOP"),    // 0x91
    Some("POKE"),    // 0x92
    Some("CONT"),    // 0x93
    Some("LIST"),    // 0x94
    Some("CLEAR"),   // 0x95
    Some("NEW"),     // 0x96
    Some("CLOAD"),   // 0x97
    Some("CSAVE"),   // 0x98
    Some("OPEN"),    // 0x99
    Some("CLOSE"),   // 0x9A
    Some("LLIST"),   // 0x9B
    Some("SET"),     // 0x9C
    Some("RESET"),   // 0x9D
    Some("CLS"),     // 0x9E
    Some("MOTOR"),   // 0x9F
    Some("SOUND"),   // 0xA0
    Some("AUDIO"),   // 0xA1
    Some("EXEC"),    // 0xA2
    Some("SKIPF"),   // 0xA3
    Some("TAB("),    // 0xA4
    Some("TO"),      // 0xA5
    Some("SUB"),     // 0xA6
    Some("THEN"),    // 0xA7
    Some("NOT"),     // 0xA8
    Some("STEP"),    // 0xA9
    Some("OFF"),     // 0xAA
    Some("+"),       // 0xAB
    Some("-"),       // 0xAC
    Some("*"),       // 0xAD
    Some("/"),       // 0xAE
    Some("^"),       // 0xAF
    Some("AND"),     // 0xB0
    Some("OR"),      // 0xB1
    Some(">"),       // 0xB2
    Some("="),       // 0xB3
    Some("<"),       // 0xB4
    Some("DEL"),     // 0xB5
    Some("EDIT"),    // 0xB6
    Some("TRON"),    // 0xB7
    Some("TROFF"),   // 0xB8
    Some("DEF"),     // 0xB9
    Some("LET"),     // 0xBA
    Some("LINE"),    // 0xBB
    Some("PCLS"),    // 0xBC
    Some("PSET"),    // 0xBD
    Some("PRESET"),  // 0xBE
    Some("SCREEN"),  // 0xBF
    Some("PCLEAR"),  // 0xC0
    Some("COLOR"),   // 0xC1
    Some("CIRCLE"),  // 0xC2
    Some("PAINT"),   // 0xC3
    Some("GET"),     // 0xC4
    Some("PUT"),     // 0xC5
    Some("DRAW"),    // 0xC6
    Some("PCOPY"),   // 0xC7
    Some("PMODE"),   // 0xC8
    Some("PLAY"),    // 0xC9
    Some("DLOAD"),   // 0xCA
    Some("RENUM"),   // 0xCB
    Some("FN"),      // 0xCC
    Some("USING"),   // 0xCD
    Some("DIR"),     // 0xCE
    Some("DRIVE"),   // 0xCF
    Some("FIELD"),   // 0xD0
    Some("FILES"),   // 0xD1
    Some("KILL"),    // 0xD2
    Some("LOAD"),    // 0xD3
    Some("LSET"),    // 0xD4
    Some("MERGE"),   // 0xD5
    Some("RENAME"),  // 0xD6
    Some("RSET"),    // 0xD7
    Some("SAVE"),    // 0xD8
    Some("WRITE"),   // 0xD9
    Some("VERIFY"),  // 0xDA
    Some("UNLOAD"),  // 0xDB
    Some("DSKINI"),  // 0xDC
    Some("BACKUP"),  // 0xDD
    Some("COPY"),    // 0xDE
    Some("DSKI$"),   // 0xDF
    Some("DSKO$"),   // 0xE0
    None,            // 0xE1
    Some("WIDTH"),   // 0xE2
    Some("PALETTE"), // 0xE3
    Some("HSCREEN"), // 0xE4
    None,            // 0xE5
    Some("HCLS"),    // 0xE6
    Some("HCOLOR"),  // 0xE7
    Some("HPAINT"),  // 0xE8
    Some("HCIRCLE"), // 0xE9
    Some("HLINE"),   // 0xEA
    Some("HGET"),    // 0xEB
    Some("HPUT"),    // 0xEC
    Some("HBUFF"),   // 0xED
    Some("HPRINT"),  // 0xEE
    Some("ERR"),     // 0xEF
    Some("BRK"),     // 0xF0
    None,            // 0xF1
    None,            // 0xF2
    Some("HSET"),    // 0xF3
    Some("HRESET"),  // 0xF4
    Some("HDRAW"),   // 0xF5
    Some("CMP"),     // 0xF6
    Some("RGB"),     // 0xF7
    Some("ATTR"),    // 0xF8
    None,            // 0xF9
    None,            // 0xFA
    None,            // 0xFB
    None,            // 0xFC
    None,            // 0xFD
    None,            // 0xFE
    None,            // 0xFF (extended escape)
];

/// Extended-function table, indexed by the byte after `0xFF`, minus `0x80`.
static EXTENDED_TOKENS: [Option<&str>; 128] = [
    Some("SGN"),     // 0x80
    Some("INT"),     // 0x81
    Some("ABS"),     // 0x82
    Some("USR"),     // 0x83
    Some("RND"),     // 0x84
    Some("SIN"),     // 0x85
    Some("PEEK"),    // 0x86
    Some("LEN"),     // 0x87
    Some("STR$"),    // 0x88
    Some("VAL"),     // 0x89
    Some("ASC"),     // 0x8A
    Some("CHR$"),    // 0x8B
    Some("EOF"),     // 0x8C
    Some("JOYSTK"),  // 0x8D
    Some("LEFT$"),   // 0x8E
    Some("RIGHT$"),  // 0x8F
    Some("MID$"),    // 0x90
    Some("POINT"),   // 0x91
    Some("INKEY$"),  // 0x92
    Some("MEM"),     // 0x93
    Some("ATN"),     // 0x94
    Some("COS"),     // 0x95
    Some("TAN"),     // 0x96
    Some("EXP"),     // 0x97
    Some("FIX"),     // 0x98
    Some("LOG"),     // 0x99
    Some("POS"),     // 0x9A
    Some("SQR"),     // 0x9B
    Some("HEX$"),    // 0x9C
    Some("VARPTR"),  // 0x9D
    Some("INSTR"),   // 0x9E
    Some("TIMER"),   // 0x9F
    Some("PPOINT"),  // 0xA0
    Some("STRING$"), // 0xA1
    Some("CVN"),     // 0xA2
    Some("FREE"),    // 0xA3
    Some("LOC"),     // 0xA4
    Some("LOF"),     // 0xA5
    Some("MKN$"),    // 0xA6
    Some("AS"),      // 0xA7
    Some("LPEEK"),   // 0xA8
    Some("BUTTON"),  // 0xA9
    Some("HPOINT"),  // 0xAA
    Some("ERNO"),    // 0xAB
    Some("ERLIN"),   // 0xAC
    None, None, None, // 0xAD..0xAF
    None, None, None, None, None, None, None, None, // 0xB0..0xB7
    None, None, None, None, None, None, None, None, // 0xB8..0xBF
    None, None, None, None, None, None, None, None, // 0xC0..0xC7
    None, None, None, None, None, None, None, None, // 0xC8..0xCF
    None, None, None, None, None, None, None, None, // 0xD0..0xD7
    None, None, None, None, None, None, None, None, // 0xD8..0xDF
    None, None, None, None, None, None, None, None, // 0xE0..0xE7
    None, None, None, None, None, None, None, None, // 0xE8..0xEF
    None, None, None, None, None, None, None, None, // 0xF0..0xF7
    None, None, None, None, None, None, None, None, // 0xF8..0xFF
];

/// Glyph emitted for bytes with no printable or token meaning.
const UNKNOWN_GLYPH: char = '\u{BF}'; // ¿

fn primary_token(byte: u8) -> Option<&'static str> {
    if byte >= 0x80 {
        PRIMARY_TOKENS[(byte - 0x80) as usize]
    } else {
        None
    }
}

fn extended_token(byte: u8) -> Option<&'static str> {
    if byte >= 0x80 {
        EXTENDED_TOKENS[(byte - 0x80) as usize]
    } else {
        None
    }
}

fn read_word_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Decode a tokenized BASIC program into source text, one `"{line} {body}"`
/// string per line, joined with `\n`.
pub fn detokenize(data: &[u8]) -> String {
    if data.is_empty() {
        return String::new();
    }

    let mut offset = 0;
    // An ML preamble means the first stored line carries no next-line link.
    let mut first_line = false;
    if data[0] == 0xFF {
        offset = 5;
        first_line = true;
    }

    let mut lines = Vec::new();
    loop {
        if offset + 2 > data.len() {
            break;
        }

        let (line_number, start) = if first_line {
            first_line = false;
            (read_word_be(data, offset), offset + 2)
        } else {
            if offset + 4 > data.len() {
                break;
            }
            let next_line = read_word_be(data, offset);
            if next_line == 0 {
                break;
            }
            (read_word_be(data, offset + 2), offset + 4)
        };
        if line_number == 0 {
            break;
        }

        let end = data[start..]
            .iter()
            .position(|&b| b == 0)
            .map_or(data.len(), |p| start + p);
        lines.push(format!("{line_number} {}", detokenize_line(&data[start..end])));
        offset = end + 1;
    }
    lines.join("\n")
}

/// Decode one line body (already cut at its `0x00` terminator).
fn detokenize_line(body: &[u8]) -> String {
    let mut output = String::new();
    let mut in_string = false;
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b == 0 {
            break;
        }
        if !in_string && b == 0xFF {
            // Extended token: the next byte indexes the function table.
            i += 1;
            if let Some(&next) = body.get(i) {
                match extended_token(next) {
                    Some(token) => output.push_str(token),
                    None => output.push_str(&format!("{{255-{next}}}")),
                }
            }
        } else if !in_string && b >= 0x80 {
            match primary_token(b) {
                Some(token) => {
                    output.push_str(token);
                    if token == "REM" || token == "'" {
                        // Comments run to the end of the line, verbatim Latin-1.
                        for &rest in &body[i + 1..] {
                            output.push(rest as char);
                        }
                        break;
                    }
                }
                None => output.push(UNKNOWN_GLYPH),
            }
        } else if (0x20..=0x7E).contains(&b) {
            let ch = b as char;
            output.push(ch);
            if ch == '"' {
                in_string = !in_string;
            }
        } else {
            output.push(UNKNOWN_GLYPH);
        }
        i += 1;
    }
    output
}
