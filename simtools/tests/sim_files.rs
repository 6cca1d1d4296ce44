use std::fs::File;
use std::io::BufWriter;

use simtools::sim::reader::SimReader;
use simtools::sim::writer::SimWriter;
use simtools::sim::{NumberFormat, SampleIntensities};

#[test_log::test]
fn test_write_and_open_integer_file() {
    let path = std::env::temp_dir().join(format!("simtools-{}.sim", std::process::id()));

    let file = BufWriter::new(File::create(&path).unwrap());
    let mut writer = SimWriter::new(file);
    writer
        .write_header(2, 3, 2, NumberFormat::Integer)
        .unwrap();
    writer
        .append_sample("first", &[1.0, 2.4, 2.6, 70000.0, -3.0, 0.0])
        .unwrap();
    writer
        .append_sample("second", &[0.0, 0.0, 0.0, 0.0, 0.0, 65535.0])
        .unwrap();
    writer.finish().unwrap();

    let reader = SimReader::open(&path).unwrap();
    assert_eq!(reader.header().num_probes, 3);
    assert_eq!(reader.number_format(), NumberFormat::Integer);

    let samples: Vec<_> = reader.collect::<Result<_, _>>().unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].name, "first");
    assert_eq!(
        samples[0].intensities,
        SampleIntensities::Integer(vec![1, 2, 3, 65535, 0, 0])
    );
    assert_eq!(samples[1].total_intensity(), 65535.0);
}
