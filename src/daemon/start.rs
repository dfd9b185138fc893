use std::time::Duration;

use crate::config::config::Config;
use crate::docker::{DockerApi, DockerError};

pub fn print_banner(config: &Config) {
    let host = config.docker.host.as_deref().unwrap_or("local socket");

    let ascii_art = format!(
        r#"
                 _           _
   _ __  ___  __| |__ _  _  | |__  ___ __ __
  | '  \/ _ \/ _` '_ \ || | | '_ \/ _ \\ \ /
  |_|_|_\___/\__,_.__/\_, | |_.__/\___//_\_\
                      |__/

mobybox v{}
Docker: {}
"#,
        env!("CARGO_PKG_VERSION"),
        host
    );

    println!("{}", ascii_art);
}

/// Verify the Docker daemon is running and accessible.
pub async fn check_docker(docker: &dyn DockerApi) -> Result<(), DockerError> {
    match tokio::time::timeout(Duration::from_secs(5), docker.ping()).await {
        Ok(Ok(())) => {
            tracing::info!("Docker daemon accessible");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("Docker daemon not accessible: {}", e);
            Err(e)
        }
        Err(_) => {
            let error_msg = "Docker ping timeout after 5 seconds";
            tracing::error!("{}", error_msg);
            Err(DockerError::Connection(error_msg.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDocker;

    #[tokio::test]
    async fn test_check_docker() {
        let fake = FakeDocker::new();
        assert!(check_docker(&fake).await.is_ok());

        fake.set_reachable(false);
        assert!(matches!(check_docker(&fake).await, Err(DockerError::Connection(_))));
    }
}
