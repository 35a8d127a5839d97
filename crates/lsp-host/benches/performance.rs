use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use lsp_host::types::{Position, Range, TextDocumentContentChangeEvent};
use lsp_host::{EditTextBuffer, JsonRpcDispatcher, MessageStreamSplitter};

fn large_text(line_count: usize) -> String {
    let mut out = String::with_capacity(line_count * 64);
    for i in 0..line_count {
        out.push_str(&format!(
            "{i:06} the quick brown fox jumps over the lazy dog (lsp-host benchmark line)\n"
        ));
    }
    out
}

fn framed_stream(message_count: usize) -> Vec<u8> {
    let body = r#"{"jsonrpc":"2.0","method":"textDocument/didSave","params":{"textDocument":{"uri":"file:///bench.txt"}}}"#;
    let mut out = Vec::with_capacity(message_count * (body.len() + 32));
    for _ in 0..message_count {
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        out.extend_from_slice(body.as_bytes());
    }
    out
}

fn bench_splitter_throughput(c: &mut Criterion) {
    let input = framed_stream(1_000);
    c.bench_function("splitter/1k_messages_4k_chunks", |b| {
        b.iter(|| {
            let mut splitter = MessageStreamSplitter::new(1 << 20);
            splitter.set_message_processor(|_header, body| {
                black_box(body.len());
            });
            let mut pos = 0;
            let mut read_fun = |buf: &mut [u8]| {
                let len = buf.len().min(4096).min(input.len() - pos);
                buf[..len].copy_from_slice(&input[pos..pos + len]);
                pos += len;
                Ok(len)
            };
            while splitter.pull_from(&mut read_fun).is_ok() {}
            black_box(splitter.total_bytes_read());
        })
    });
}

fn bench_single_line_edit_storm(c: &mut Criterion) {
    let text = large_text(10_000);
    c.bench_function("buffer/1k_single_line_edits", |b| {
        b.iter_batched(
            || EditTextBuffer::new(&text),
            |mut buffer| {
                for i in 0..1_000u32 {
                    let line = (i * 7) % 10_000;
                    let change = TextDocumentContentChangeEvent::ranged(
                        Range::new(Position::new(line, 10), Position::new(line, 15)),
                        "quick",
                    );
                    buffer.apply_change(&change);
                }
                black_box(buffer.document_length());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_multi_line_edit(c: &mut Criterion) {
    let text = large_text(10_000);
    c.bench_function("buffer/multi_line_splice", |b| {
        b.iter_batched(
            || EditTextBuffer::new(&text),
            |mut buffer| {
                let change = TextDocumentContentChangeEvent::ranged(
                    Range::new(Position::new(100, 0), Position::new(5_000, 0)),
                    "replacement\nspanning\nlines\n",
                );
                buffer.apply_change(&change);
                black_box(buffer.line_count());
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_dispatch_roundtrip(c: &mut Criterion) {
    let body =
        br#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"payload":"0123456789abcdef"}}"#;
    c.bench_function("dispatcher/echo_roundtrip", |b| {
        let mut dispatcher = JsonRpcDispatcher::new(|reply: &str| {
            black_box(reply.len());
        });
        dispatcher.add_request_handler("echo", |params| Ok(params.clone()));
        b.iter(|| dispatcher.dispatch_message(black_box(body)));
    });
}

criterion_group!(
    benches,
    bench_splitter_throughput,
    bench_single_line_edit_storm,
    bench_multi_line_edit,
    bench_dispatch_roundtrip
);
criterion_main!(benches);
