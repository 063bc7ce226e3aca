// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests for the legacy bridge against a stand-in interpreter.

use std::fs;
use std::path::PathBuf;

use glob::glob;
use tempfile::tempdir;

use dunnart::{
    fhd::{run_calibration_only, run_healpix_imaging, FhdError},
    ProValue, RunConfig, RunConfigBuilder,
};

fn test_config(output_path: PathBuf) -> RunConfig {
    RunConfigBuilder::default()
        .obs_id("1061316296".to_string())
        .input_path(PathBuf::from("/data/in"))
        .output_path(output_path)
        .version("cal0".to_string())
        // a stand-in for idl that exits 0
        .idl_command("echo".to_string())
        .build()
        .unwrap()
}

#[test]
fn test_calibration_stage_writes_scripts_and_runs() {
    let tmp_dir = tempdir().unwrap();
    let config = test_config(tmp_dir.path().to_path_buf());

    let run_info = run_calibration_only(&config).unwrap();
    assert_eq!(run_info.exit_status, Some(0));
    assert_eq!(run_info.output_dir, tmp_dir.path().join("cal0/fhd_cal0"));

    let run_dir = config.run_dir();
    for name in [
        "dunnart_config.pro",
        "run_fhd_calibration_only.pro",
        "fhd_calibration_only.pro",
        "general_calibration_only.pro",
    ] {
        assert!(run_dir.join(name).is_file(), "{} was not written", name);
    }

    let config_pro = fs::read_to_string(run_dir.join("dunnart_config.pro")).unwrap();
    assert!(config_pro.contains("obs_id='1061316296'"));
    assert!(config_pro.contains(&format!(
        "output_directory='{}'",
        run_dir.display()
    )));

    let driver = fs::read_to_string(run_dir.join("run_fhd_calibration_only.pro")).unwrap();
    assert!(driver.contains("vis_file_list=\"/data/in/1061316296.uvfits\""));
    assert!(driver.contains("general_calibration_only,_Extra=extra"));
}

#[test]
fn test_healpix_stage_installs_all_templates() {
    let tmp_dir = tempdir().unwrap();
    let mut config = test_config(tmp_dir.path().to_path_buf());
    config.grid_psf_file = Some(PathBuf::from("/data/psf/gauss_beam.sav"));

    let run_info = run_healpix_imaging(&config).unwrap();
    assert_eq!(run_info.exit_status, Some(0));

    let pattern = config.run_dir().join("*.pro");
    let pro_files: Vec<_> = glob(pattern.to_str().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    // config + driver + 4 templates
    assert_eq!(pro_files.len(), 6);

    let driver = fs::read_to_string(config.run_dir().join("run_fhd_healpix_imaging.pro")).unwrap();
    assert!(driver.contains("grid_psf_file='/data/psf/gauss_beam.sav'"));
    assert!(driver.contains("restrict_hpx_inds='EoR0_high_healpix_inds_3x.idlsave'"));
}

#[test]
fn test_passthrough_options_reach_the_config_script() {
    let tmp_dir = tempdir().unwrap();
    let mut config = test_config(tmp_dir.path().to_path_buf());
    config.extra = vec![
        ("n-avg".to_string(), ProValue::Int(2)),
        ("cal-stop".to_string(), ProValue::Bool(true)),
        ("transfer-model-uv".to_string(), ProValue::Null),
    ];

    run_calibration_only(&config).unwrap();

    let config_pro = fs::read_to_string(config.run_dir().join("dunnart_config.pro")).unwrap();
    assert!(config_pro.contains("  n_avg=2\n"));
    assert!(config_pro.contains("  cal_stop=1\n"));
    assert!(config_pro.contains("  transfer_model_uv=!NULL\n"));
}

#[test]
fn test_missing_interpreter_is_a_launch_error() {
    let tmp_dir = tempdir().unwrap();
    let mut config = test_config(tmp_dir.path().to_path_buf());
    config.idl_command = "definitely-not-a-real-interpreter".to_string();

    let result = run_calibration_only(&config);
    assert!(matches!(result, Err(FhdError::Launch { .. })));
}

#[test]
fn test_rerunning_a_stage_overwrites_scripts() {
    let tmp_dir = tempdir().unwrap();
    let mut config = test_config(tmp_dir.path().to_path_buf());
    run_calibration_only(&config).unwrap();

    config.kbinsize = Some(0.25);
    run_calibration_only(&config).unwrap();

    let config_pro = fs::read_to_string(config.run_dir().join("dunnart_config.pro")).unwrap();
    assert!(config_pro.contains("  kbinsize=0.25\n"));
}
