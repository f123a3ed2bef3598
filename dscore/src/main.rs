use dscore::algorithm::filter::{trapezoidal, TraceAnalyzer, TrapezoidParams};
use dscore::data::trace::Trace;

fn main() {
    // A small pulse riding on a flat baseline of 10.
    let samples = vec![10, 10, 10, 10, 10, 10, 10, 10, 60, 45, 32, 24, 18, 14, 12, 11];
    let mut trace = Trace::new(samples);

    let stage = TraceAnalyzer::new(&mut trace)
        .baseline(0, 6)
        .expect("baseline window fits the trace");
    let mut peaked = stage.find_peak(1, 1).expect("trimmed peak range is non-empty");
    peaked.qdc(6, 10).expect("qdc window fits the trace");
    peaked.psd(0, 4).expect("psd window fits the trace");

    println!("{}", trace);

    let params = TrapezoidParams::new(2, 1).expect("valid filter geometry");
    let mut filtered = Vec::new();
    trapezoidal(&trace, 0, trace.len(), &params, &mut filtered)
        .expect("output range fits the trace");
    println!("trapezoid: {:?}", filtered);
}
