/*
    rtl86

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    ---------------------------------------------------------------------------

    benches::decode_bench.rs

    Benchmarks for the instruction decoder

*/

use rand::Rng;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rtl86_core::{
    bytereader::{ByteReader, InstructionStream},
    cpu_386::{DecodeShape, Decoder},
    cpu_common::OperandSize,
    rtl::RtlCpu,
};

const STREAM_SIZE: usize = 0x10000;

pub fn decode_random_bench(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..STREAM_SIZE).map(|_| rng.gen()).collect();

    let mut cpu = RtlCpu::new(STREAM_SIZE);
    let mut decoder = Decoder::new(OperandSize::Operand32);
    let mut stream = InstructionStream::new(&bytes, 0);

    c.bench_function("decode_random_bench", |b| {
        b.iter(|| {
            // Random streams are full of unsupported opcodes; errors are part of the workload.
            stream.seek(rng.gen_range(0..(STREAM_SIZE - 16) as u32));
            let _ = black_box(decoder.decode_instruction(&mut stream, &mut cpu));
        });
    });
}

pub fn decode_shape_bench(c: &mut Criterion) {
    // add dword ptr [eax+ecx*4-4], 12345678h
    let bytes = [0x81, 0x44, 0x88, 0xFC, 0x78, 0x56, 0x34, 0x12];

    let mut cpu = RtlCpu::new(STREAM_SIZE);
    let mut decoder = Decoder::new(OperandSize::Operand32);
    let mut stream = InstructionStream::new(&bytes, 0);

    c.bench_function("decode_shape_bench", |b| {
        b.iter(|| {
            stream.seek(1);
            decoder.begin(0x81, 4);
            _ = DecodeShape::I2E.decode(&mut decoder, &mut stream, &mut cpu);
            black_box(decoder.src.val);
        });
    });
}

pub fn decode_random_baseline(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    c.bench_function("decode_random_baseline", |b| {
        b.iter(|| {
            black_box(rng.gen_range(0..(STREAM_SIZE - 16) as u32));
        });
    });
}

criterion_group!(decode_benches, decode_random_bench, decode_shape_bench, decode_random_baseline);

criterion_main!(decode_benches);
