use crate::error::{RadioEditError, Result};
use log::{info, warn};
use tokio::process::Command;

/// Check if all required system dependencies are available
pub async fn validate_dependencies() -> Result<()> {
    info!("Validating system dependencies...");

    check_ffmpeg().await?;
    let python = find_python().await?;
    check_python_module(&python, "demucs", "demucs").await?;
    check_python_module(&python, "faster_whisper", "faster-whisper").await?;

    info!("All dependencies validated successfully");
    Ok(())
}

/// Check if FFmpeg is available and get version info
async fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg")
        .args(["-version"])
        .output()
        .await
        .map_err(|_| RadioEditError::MissingDependency {
            name: "FFmpeg".to_string(),
            suggestion: "Install FFmpeg: https://ffmpeg.org/download.html".to_string(),
        })?;

    if !output.status.success() {
        return Err(RadioEditError::MissingDependency {
            name: "FFmpeg".to_string(),
            suggestion: "FFmpeg is installed but not working properly".to_string(),
        });
    }

    let version_info = String::from_utf8_lossy(&output.stdout);
    if let Some(version_line) = version_info.lines().next() {
        info!("FFmpeg found: {}", version_line);
    }

    Ok(())
}

/// Resolve the Python interpreter, preferring `python3`
pub async fn find_python() -> Result<String> {
    for candidate in ["python3", "python"] {
        let output = Command::new(candidate)
            .args(["-c", "import sys; print(f'Python {sys.version.split()[0]}')"])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                info!("Python found: {}", version.trim());
                return Ok(candidate.to_string());
            }
            Ok(_) => warn!("{} is installed but not working properly", candidate),
            Err(_) => {}
        }
    }

    Err(RadioEditError::MissingDependency {
        name: "Python".to_string(),
        suggestion: "Install Python 3.8+ from https://python.org".to_string(),
    })
}

async fn check_python_module(python: &str, module: &str, package: &str) -> Result<()> {
    let missing = || RadioEditError::MissingDependency {
        name: package.to_string(),
        suggestion: format!("Install {}: pip install {}", package, package),
    };

    let script = format!(
        "import {m}; print('{p}', getattr({m}, '__version__', 'unknown'))",
        m = module,
        p = package
    );
    let output = Command::new(python)
        .args(["-c", &script])
        .output()
        .await
        .map_err(|_| missing())?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No module named") {
            return Err(missing());
        }
        // Import side effects can fail without the module being unusable
        warn!("{} check failed, but may still work: {}", package, stderr.trim());
        return Ok(());
    }

    info!("{} found: {}", package, String::from_utf8_lossy(&output.stdout).trim());
    Ok(())
}
