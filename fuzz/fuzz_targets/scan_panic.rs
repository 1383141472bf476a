#![no_main]
use ferrosync::Scanner;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Basic fuzzing for panic freedom: arbitrary bytes must only ever
    // produce an error or a (possibly partial) scanner. parse_bytes
    // sniffs the gzip magic itself, so compressed corpora work too.
    let _ = Scanner::parse_bytes(data);
});
